//! Connection-engine behavior against scripted in-process brokers.

use bytes::{Buf, BufMut, BytesMut};
use logwire::{
    Connection, ErrorCode, FetchRequest, LogwireError, Message, MultiFetchRequest, OffsetTime,
    OffsetsRequest, ProduceRequest,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Read one request frame off the socket; returns (type code, body).
async fn read_frame(stream: &mut TcpStream) -> (i16, BytesMut) {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.unwrap();
    let len = i32::from_be_bytes(len_buf) as usize;
    let mut frame = vec![0u8; len];
    stream.read_exact(&mut frame).await.unwrap();
    let mut frame = BytesMut::from(&frame[..]);
    let kind = frame.get_i16();
    (kind, frame)
}

/// A reply frame: length, success code, body.
fn reply(body: &[u8]) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_i32(2 + body.len() as i32);
    buf.put_i16(0);
    buf.extend_from_slice(body);
    buf
}

/// One message record as the broker would send it.
fn record(payload: &[u8]) -> BytesMut {
    let mut buf = BytesMut::new();
    buf.put_i32(6 + payload.len() as i32);
    buf.put_i8(1); // magic
    buf.put_i8(0); // no compression
    buf.put_u32(crc32fast::hash(payload));
    buf.extend_from_slice(payload);
    buf
}

#[tokio::test]
async fn produce_writes_exact_frame_and_consumes_no_reply_slot() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let broker = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let (kind, mut body) = read_frame(&mut stream).await;
        assert_eq!(kind, 0);
        assert_eq!(body.get_i16(), 3);
        assert_eq!(&body.split_to(3)[..], b"foo");
        assert_eq!(body.get_i32(), 0); // partition
        assert_eq!(body.get_i32(), 15); // message set length
        assert_eq!(body.get_i32(), 11); // record length
        assert_eq!(body.get_i8(), 1); // magic
        assert_eq!(body.get_i8(), 0); // compression
        assert_eq!(body.get_u32(), crc32fast::hash(b"hello"));
        assert_eq!(&body[..], b"hello");

        // The next frame must be the offsets request: produce left no
        // reply pending, so the first reply we send belongs to it.
        let (kind, _) = read_frame(&mut stream).await;
        assert_eq!(kind, 4);
        let mut body = BytesMut::new();
        body.put_i32(1);
        body.put_i64(362);
        stream.write_all(&reply(&body)).await.unwrap();
    });

    let conn = Connection::dial(addr).await.unwrap();
    conn.produce(&ProduceRequest::new(
        "foo",
        0,
        vec![Message::from(&b"hello"[..])],
    ))
    .await
    .unwrap();

    let mut offsets = conn
        .offsets(&OffsetsRequest::new("foo", 0, OffsetTime::Latest, 1))
        .await
        .unwrap();
    let response = offsets.recv().await.unwrap().unwrap();
    assert_eq!(response.offsets.len(), 1);
    assert_eq!(response.offsets[0].offset, 362);

    broker.await.unwrap();
}

#[tokio::test]
async fn offsets_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let broker = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (kind, mut body) = read_frame(&mut stream).await;
        assert_eq!(kind, 4);
        assert_eq!(body.get_i16(), 3);
        assert_eq!(&body.split_to(3)[..], b"foo");
        assert_eq!(body.get_i32(), 0);
        assert_eq!(body.get_i64(), -1); // latest
        assert_eq!(body.get_i32(), 1);
        assert!(body.is_empty());

        let mut reply_body = BytesMut::new();
        reply_body.put_i32(1);
        reply_body.put_i64(362);
        stream.write_all(&reply(&reply_body)).await.unwrap();
    });

    let conn = Connection::dial(addr).await.unwrap();
    let mut stream = conn
        .offsets(&OffsetsRequest::new("foo", 0, OffsetTime::Latest, 1))
        .await
        .unwrap();

    let response = stream.recv().await.unwrap().unwrap();
    assert_eq!(response.offsets.len(), 1);
    assert_eq!(response.offsets[0].topic, "foo");
    assert_eq!(response.offsets[0].partition, 0);
    assert_eq!(response.offsets[0].offset, 362);
    assert!(stream.recv().await.is_none());

    broker.await.unwrap();
}

#[tokio::test]
async fn fetch_yields_records_with_post_message_offsets() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let broker = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (kind, _) = read_frame(&mut stream).await;
        assert_eq!(kind, 1);

        let mut set = BytesMut::new();
        set.extend_from_slice(&record(b"hello"));
        set.extend_from_slice(&record(b"there"));
        stream.write_all(&reply(&set)).await.unwrap();
    });

    let conn = Connection::dial(addr).await.unwrap();
    let mut stream = conn
        .fetch(&FetchRequest::new("foo", 0, 0, 3045))
        .await
        .unwrap();

    let first = stream.recv().await.unwrap().unwrap();
    assert_eq!(&first.payload[..], b"hello");
    assert_eq!(first.offset, 15);
    assert_eq!(first.topic, "foo");

    let second = stream.recv().await.unwrap().unwrap();
    assert_eq!(&second.payload[..], b"there");
    assert_eq!(second.offset, 30);

    assert!(stream.recv().await.is_none());
    broker.await.unwrap();
}

#[tokio::test]
async fn crc_mismatch_fails_stream_and_kills_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let broker = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (kind, _) = read_frame(&mut stream).await;
        assert_eq!(kind, 1);

        let mut bad = record(b"there");
        // corrupt the checksum field
        let crc = crc32fast::hash(b"there").wrapping_add(1);
        bad[6..10].copy_from_slice(&crc.to_be_bytes());

        let mut set = BytesMut::new();
        set.extend_from_slice(&record(b"hello"));
        set.extend_from_slice(&bad);
        stream.write_all(&reply(&set)).await.unwrap();

        // Hold the socket open; the client must still treat the
        // connection as dead after the decode error.
        let mut sink = [0u8; 64];
        let _ = stream.read(&mut sink).await;
    });

    let conn = Connection::dial(addr).await.unwrap();
    let mut stream = conn
        .fetch(&FetchRequest::new("foo", 0, 0, 3045))
        .await
        .unwrap();

    let first = stream.recv().await.unwrap().unwrap();
    assert_eq!(&first.payload[..], b"hello");
    let failure = stream.recv().await.unwrap();
    assert!(matches!(
        failure,
        Err(LogwireError::CrcMismatch { .. })
    ));
    assert!(stream.recv().await.is_none());

    // Any further request fails: rejected at submission or failed by the
    // teardown fan-out, depending on when the reader finishes dying.
    match conn.fetch(&FetchRequest::new("foo", 0, 0, 3045)).await {
        Err(_) => {}
        Ok(mut dead) => {
            assert!(dead.recv().await.unwrap().is_err());
            assert!(dead.recv().await.is_none());
        }
    }

    conn.close().await.ok();
    broker.await.unwrap();
}

#[tokio::test]
async fn multi_fetch_delivers_nested_error_and_continues() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let broker = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (kind, mut body) = read_frame(&mut stream).await;
        assert_eq!(kind, 2);
        assert_eq!(body.get_i16(), 3); // subrequest count

        let mut reply_body = BytesMut::new();
        // foo: one record
        let mut set = BytesMut::new();
        set.put_i16(0);
        set.extend_from_slice(&record(b"hello"));
        reply_body.put_i32(set.len() as i32);
        reply_body.extend_from_slice(&set);
        // bar: offset out of range
        reply_body.put_i32(2);
        reply_body.put_i16(1);
        // baz: one record after the failed subrequest
        let mut set = BytesMut::new();
        set.put_i16(0);
        set.extend_from_slice(&record(b"there"));
        reply_body.put_i32(set.len() as i32);
        reply_body.extend_from_slice(&set);

        stream.write_all(&reply(&reply_body)).await.unwrap();
    });

    let conn = Connection::dial(addr).await.unwrap();
    let mut stream = conn
        .multi_fetch(&MultiFetchRequest(vec![
            FetchRequest::new("foo", 0, 0, 1024),
            FetchRequest::new("bar", 0, 0, 1024),
            FetchRequest::new("baz", 0, 0, 1024),
        ]))
        .await
        .unwrap();

    let first = stream.recv().await.unwrap().unwrap();
    assert_eq!(first.topic, "foo");
    assert_eq!(&first.payload[..], b"hello");
    assert_eq!(first.offset, 15);

    let failure = stream.recv().await.unwrap();
    match failure {
        Err(LogwireError::PartitionBroker {
            topic,
            partition,
            code,
        }) => {
            assert_eq!(topic, "bar");
            assert_eq!(partition, 0);
            assert_eq!(code, ErrorCode::OffsetOutOfRange);
        }
        other => panic!("expected labeled broker error, got {:?}", other),
    }

    let third = stream.recv().await.unwrap().unwrap();
    assert_eq!(third.topic, "baz");
    assert_eq!(&third.payload[..], b"there");

    assert!(stream.recv().await.is_none());
    broker.await.unwrap();
}

#[tokio::test]
async fn pipelined_replies_route_in_submission_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let broker = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        // Both requests arrive before any reply is written.
        let (kind, _) = read_frame(&mut stream).await;
        assert_eq!(kind, 1);
        let (kind, _) = read_frame(&mut stream).await;
        assert_eq!(kind, 4);

        let mut set = BytesMut::new();
        set.extend_from_slice(&record(b"hello"));
        set.extend_from_slice(&record(b"there"));
        stream.write_all(&reply(&set)).await.unwrap();

        let mut offsets_body = BytesMut::new();
        offsets_body.put_i32(1);
        offsets_body.put_i64(30);
        stream.write_all(&reply(&offsets_body)).await.unwrap();
    });

    let conn = Connection::dial(addr).await.unwrap();
    let mut fetch_stream = conn
        .fetch(&FetchRequest::new("foo", 0, 0, 3045))
        .await
        .unwrap();
    let mut offsets_stream = conn
        .offsets(&OffsetsRequest::new("foo", 0, OffsetTime::Latest, 1))
        .await
        .unwrap();

    // The fetch reply is decoded first; nothing shows up on the offsets
    // channel until its stream is drained.
    assert!(offsets_stream.try_recv().is_err());

    let first = fetch_stream.recv().await.unwrap().unwrap();
    assert_eq!(&first.payload[..], b"hello");
    let second = fetch_stream.recv().await.unwrap().unwrap();
    assert_eq!(&second.payload[..], b"there");
    assert!(fetch_stream.recv().await.is_none());

    let response = offsets_stream.recv().await.unwrap().unwrap();
    assert_eq!(response.offsets[0].offset, 30);
    assert!(offsets_stream.recv().await.is_none());

    broker.await.unwrap();
}

#[tokio::test]
async fn teardown_fails_every_pending_request_exactly_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let broker = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        for _ in 0..3 {
            read_frame(&mut stream).await;
        }
        // Drop the socket with three requests outstanding.
    });

    let conn = Connection::dial(addr).await.unwrap();
    let mut waiting = Vec::new();
    for _ in 0..2 {
        waiting.push(
            conn.fetch(&FetchRequest::new("foo", 0, 0, 1024))
                .await
                .unwrap(),
        );
    }
    waiting.push(
        conn.multi_fetch(&MultiFetchRequest(vec![FetchRequest::new(
            "bar", 0, 0, 1024,
        )]))
        .await
        .unwrap(),
    );
    broker.await.unwrap();

    for mut stream in waiting {
        let failure = stream.recv().await.unwrap();
        assert!(matches!(failure, Err(LogwireError::ConnectionLost(_))));
        assert!(stream.recv().await.is_none());
    }
}

#[tokio::test]
async fn close_drains_pending_requests() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let broker = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        for _ in 0..2 {
            read_frame(&mut stream).await;
        }
        // Never reply; hold the socket until the client hangs up.
        let mut sink = [0u8; 64];
        let _ = stream.read(&mut sink).await;
    });

    let conn = Connection::dial(addr).await.unwrap();
    let mut first = conn
        .fetch(&FetchRequest::new("foo", 0, 0, 1024))
        .await
        .unwrap();
    let mut second = conn
        .offsets(&OffsetsRequest::new("foo", 0, OffsetTime::Latest, 1))
        .await
        .unwrap();

    conn.close().await.unwrap();

    let failure = first.recv().await.unwrap();
    assert!(matches!(failure, Err(LogwireError::ConnectionLost(_))));
    assert!(first.recv().await.is_none());

    let failure = second.recv().await.unwrap();
    assert!(matches!(failure, Err(LogwireError::ConnectionLost(_))));
    assert!(second.recv().await.is_none());

    broker.await.unwrap();
}

#[tokio::test]
async fn top_level_error_fails_head_job_but_connection_survives() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let broker = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let (kind, _) = read_frame(&mut stream).await;
        assert_eq!(kind, 1);
        let mut failure = BytesMut::new();
        failure.put_i32(2);
        failure.put_i16(1); // offset out of range
        stream.write_all(&failure).await.unwrap();

        // The connection must still be usable afterwards.
        let (kind, _) = read_frame(&mut stream).await;
        assert_eq!(kind, 1);
        let set = record(b"hello");
        stream.write_all(&reply(&set)).await.unwrap();
    });

    let conn = Connection::dial(addr).await.unwrap();

    let mut failed = conn
        .fetch(&FetchRequest::new("foo", 0, 99999, 1024))
        .await
        .unwrap();
    let failure = failed.recv().await.unwrap();
    assert!(matches!(
        failure,
        Err(LogwireError::Broker(ErrorCode::OffsetOutOfRange))
    ));
    assert!(failed.recv().await.is_none());

    let mut ok = conn
        .fetch(&FetchRequest::new("foo", 0, 0, 1024))
        .await
        .unwrap();
    let response = ok.recv().await.unwrap().unwrap();
    assert_eq!(&response.payload[..], b"hello");
    assert!(ok.recv().await.is_none());

    broker.await.unwrap();
}
