//! End-to-end YMODEM sessions over the in-memory loopback transport.

use {
    fwuploader::{
        Error, ReceivedFile, ReceiverConfig, SenderConfig, TransferReport, YmodemReceiver,
        YmodemSender, port::loopback,
    },
    std::{thread, time::Duration},
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn round_trip(
    data: &[u8],
    filename: &str,
    receiver_config: ReceiverConfig,
) -> (TransferReport, ReceivedFile) {
    init_logging();
    let (mut host, mut board) = loopback::pair(Duration::from_secs(2));

    let receiver = thread::spawn(move || {
        YmodemReceiver::with_config(&mut board, receiver_config).receive()
    });

    let config = SenderConfig::default().with_block_delay(Duration::ZERO);
    let report = YmodemSender::with_config(&mut host, config)
        .send(data, filename)
        .expect("send failed");
    let file = receiver
        .join()
        .expect("receiver thread panicked")
        .expect("receive failed");
    (report, file)
}

#[test]
fn test_round_trip_sizes() {
    for len in [0, 1, 1023, 1024, 1025, 4096] {
        let data = payload(len);

        let (report, file) = round_trip(&data, "firmware.bin", ReceiverConfig::default());

        assert!(report.is_complete(), "size {len}");
        assert_eq!(report.bytes, len);
        assert_eq!(report.blocks, len.div_ceil(1024));
        assert_eq!(file.filename, "firmware.bin");
        assert_eq!(file.data, data, "size {len}");
    }
}

#[test]
fn test_round_trip_filenames() {
    let data = payload(3000);
    for (sent, received) in [
        ("roots.pem", "roots.pem"),
        ("certs/roots.pem", "roots.pem"),
        ("/tmp/a b c.der", "a b c.der"),
        ("noext", "noext"),
    ] {
        let (_, file) = round_trip(&data, sent, ReceiverConfig::default());
        assert_eq!(file.filename, received);
        assert_eq!(file.data, data);
    }
}

#[test]
fn test_round_trip_strict_receiver() {
    let data = payload(5000);

    let (report, file) = round_trip(
        &data,
        "strict.bin",
        ReceiverConfig::default().with_strict_checksum(true),
    );

    assert_eq!(report.failures, 0);
    assert_eq!(file.data, data);
}

#[test]
fn test_sender_times_out_without_receiver() {
    init_logging();
    let (mut host, _board) = loopback::pair(Duration::from_millis(50));

    let err = YmodemSender::new(&mut host).send(b"abc", "a").unwrap_err();

    assert!(matches!(err, Error::Timeout(_)));
}
