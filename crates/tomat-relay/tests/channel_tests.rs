//! Integration tests for the video and chat channels against a local
//! WebSocket server.

use std::future::Future;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout, Duration};
use tokio_websockets::{Message, ServerBuilder, WebSocketStream};
use tomat_core::{ChannelState, EncodedStill, FeedMessage, SendOutcome};
use tomat_relay::{ChatChannel, FeedChannel, FrameSink};

/// Accept a single connection and hand the WebSocket to `handler`.
async fn spawn_server<F, Fut>(handler: F) -> SocketAddr
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            if let Ok((_request, ws)) = ServerBuilder::new().accept(stream).await {
                handler(ws).await;
            }
        }
    });
    addr
}

fn still(payload: &str) -> EncodedStill {
    EncodedStill {
        data_url: format!("data:image/jpeg;base64,{payload}"),
        width: 4,
        height: 4,
    }
}

async fn wait_for_terminal_state<S: FrameSink>(sink: &S) {
    for _ in 0..200 {
        if sink.state().is_terminal() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("channel never reached a terminal state, still {}", sink.state());
}

#[tokio::test]
async fn open_reaches_open_state() {
    let addr = spawn_server(|_ws| async {
        sleep(Duration::from_secs(5)).await;
    })
    .await;

    let channel = FeedChannel::open(&format!("ws://{addr}/ws/process_video"))
        .await
        .expect("connect failed");
    assert_eq!(channel.state(), ChannelState::Open);
}

#[tokio::test]
async fn open_against_dead_endpoint_fails() {
    // Bind and drop to get a port nothing listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
        listener.local_addr().expect("local addr")
    };

    let result = FeedChannel::open(&format!("ws://{addr}/ws/process_video")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn inbound_messages_are_classified_in_arrival_order() {
    let addr = spawn_server(|mut ws| async move {
        ws.send(Message::text("error: detector unavailable".to_owned()))
            .await
            .expect("server send");
        ws.send(Message::text("data:image/jpeg;base64,QUJD".to_owned()))
            .await
            .expect("server send");
        sleep(Duration::from_secs(5)).await;
    })
    .await;

    let channel = FeedChannel::open(&format!("ws://{addr}/ws/process_video"))
        .await
        .expect("connect failed");
    let (_sender, mut inbound) = channel.start_recv_loop();

    let first = timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("recv timed out")
        .expect("channel ended");
    assert_eq!(
        first,
        FeedMessage::Status("error: detector unavailable".into())
    );

    let second = timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("recv timed out")
        .expect("channel ended");
    assert_eq!(
        second,
        FeedMessage::Frame("data:image/jpeg;base64,QUJD".into())
    );
}

#[tokio::test]
async fn sent_frames_arrive_as_single_text_messages() {
    // The server echoes each received payload back with a text prefix so
    // the client can verify what actually went over the wire.
    let addr = spawn_server(|mut ws| async move {
        while let Some(Ok(msg)) = ws.next().await {
            if let Some(text) = msg.as_text() {
                let echo = format!("echo {text}");
                if ws.send(Message::text(echo)).await.is_err() {
                    return;
                }
            }
        }
    })
    .await;

    let channel = FeedChannel::open(&format!("ws://{addr}/ws/process_video"))
        .await
        .expect("connect failed");
    let (mut sender, mut inbound) = channel.start_recv_loop();

    let frame = still("QUJD");
    assert_eq!(sender.send(&frame).await, SendOutcome::Sent);

    let reply = timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("recv timed out")
        .expect("channel ended");
    assert_eq!(
        reply,
        FeedMessage::Status("echo data:image/jpeg;base64,QUJD".into())
    );
}

#[tokio::test]
async fn send_after_remote_drop_is_dropped_not_error() {
    let addr = spawn_server(|_ws| async {
        // Drop the connection immediately.
    })
    .await;

    let channel = FeedChannel::open(&format!("ws://{addr}/ws/process_video"))
        .await
        .expect("connect failed");
    let (mut sender, _inbound) = channel.start_recv_loop();

    wait_for_terminal_state(&sender).await;
    assert_eq!(sender.send(&still("AAAA")).await, SendOutcome::Dropped);
    // A second attempt is equally harmless.
    assert_eq!(sender.send(&still("BBBB")).await, SendOutcome::Dropped);
}

#[tokio::test]
async fn close_is_idempotent() {
    let addr = spawn_server(|mut ws| async move {
        while ws.next().await.is_some() {}
    })
    .await;

    let channel = FeedChannel::open(&format!("ws://{addr}/ws/process_video"))
        .await
        .expect("connect failed");
    let (mut sender, _inbound) = channel.start_recv_loop();

    sender.close().await;
    assert_eq!(sender.state(), ChannelState::Closed);

    sender.close().await;
    assert_eq!(sender.state(), ChannelState::Closed);
    assert_eq!(sender.send(&still("AAAA")).await, SendOutcome::Dropped);
}

#[tokio::test]
async fn chat_round_trip() {
    let addr = spawn_server(|mut ws| async move {
        while let Some(Ok(msg)) = ws.next().await {
            if let Some(text) = msg.as_text() {
                let reply = if text.contains("tomato") {
                    "You got it! Going for the red one."
                } else {
                    "Hello!"
                };
                if ws.send(Message::text(reply.to_owned())).await.is_err() {
                    return;
                }
            }
        }
    })
    .await;

    let chat = ChatChannel::open(&format!("ws://{addr}/ws"))
        .await
        .expect("connect failed");
    let (mut sender, mut replies) = chat.start_recv_loop();

    sender.send("pick the ripe tomato").await.expect("send");
    let reply = timeout(Duration::from_secs(5), replies.recv())
        .await
        .expect("recv timed out")
        .expect("channel ended");
    assert_eq!(reply, "You got it! Going for the red one.");

    sender.close().await;
}
