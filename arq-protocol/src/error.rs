//! Engine errors
//!
//! Loss, reordering, duplication and admission rejection are protocol-normal
//! and never show up here. Only transport failures and configuration problems
//! leave an engine as an error.

use crate::window::WindowError;
use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArqError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No datagram received for {0:?}")]
    IdleTimeout(Duration),
}
