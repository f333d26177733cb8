//! Transfers over real UDP sockets on the loopback interface

use arq_io::UdpChannel;
use arq_protocol::{
    linger, EngineConfig, LingerConfig, SeqNumber, SlidingWindowReceiver, SlidingWindowSender,
    StopWaitReceiver, StopWaitSender,
};
use arq_tests::is_in_order;
use std::thread;
use std::time::Duration;

fn bind_pair() -> (UdpChannel, UdpChannel) {
    let server = UdpChannel::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let port = server.local_addr().unwrap().port();

    let mut client = UdpChannel::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    client.set_dest_address("127.0.0.1", port).unwrap();
    (client, server)
}

fn linger_config() -> LingerConfig {
    LingerConfig {
        count: 5,
        interval: Duration::from_millis(10),
    }
}

#[test]
fn test_sliding_window_over_loopback() {
    let (mut client, mut server) = bind_pair();
    let config = EngineConfig::default()
        .with_segment_count(500)
        .with_window_size(5)
        .with_rto(Duration::from_millis(20))
        .with_idle_timeout(Some(Duration::from_secs(5)));

    let server_config = config.clone();
    let responder = thread::spawn(move || {
        let mut delivered = Vec::new();
        let stats = SlidingWindowReceiver::new(server_config.clone())
            .unwrap()
            .receive(&mut server, |s| {
                assert!(s.has_pattern());
                delivered.push(s.seq_number());
            })
            .unwrap();
        linger(&mut server, server_config.final_seq(), &linger_config()).unwrap();
        (stats, delivered)
    });

    let sent = SlidingWindowSender::new(config).unwrap().send(&mut client).unwrap();
    let (received, delivered) = responder.join().unwrap();

    assert!(is_in_order(&delivered, 500));
    assert_eq!(received.delivered, 500);
    assert_eq!(sent.acked_through, Some(SeqNumber::new(499)));
    assert!(sent.max_outstanding <= 5);
}

#[test]
fn test_stop_wait_over_loopback() {
    let (mut client, mut server) = bind_pair();
    let config = EngineConfig::default()
        .with_segment_count(100)
        .with_rto(Duration::from_millis(20))
        .with_idle_timeout(Some(Duration::from_secs(5)));

    let server_config = config.clone();
    let responder = thread::spawn(move || {
        let mut delivered = Vec::new();
        StopWaitReceiver::new(server_config.clone())
            .unwrap()
            .receive(&mut server, |s| delivered.push(s.seq_number()))
            .unwrap();
        linger(&mut server, server_config.final_seq(), &linger_config()).unwrap();
        delivered
    });

    let sent = StopWaitSender::new(config).unwrap().send(&mut client).unwrap();
    let delivered = responder.join().unwrap();

    assert!(is_in_order(&delivered, 100));
    assert_eq!(sent.segments_sent, 100);
}
