//! Helpers shared by socket tests.

use std::future::Future;
use std::net::SocketAddr;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

pub(crate) type ServerSocket = WebSocketStream<TcpStream>;

/// Accepts one websocket connection on `127.0.0.1:0` and hands it to `handler`.
pub(crate) async fn ws_server<F, Fut>(handler: F) -> SocketAddr
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handler(ws).await;
    });
    addr
}

/// Next text/binary/close frame, skipping pings.
pub(crate) async fn next_frame(ws: &mut ServerSocket) -> Option<Message> {
    loop {
        match ws.next().await? {
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(other) => return Some(other),
            Err(_) => return None,
        }
    }
}
