//! Data forwarding module
//!
//! This module copies data in both directions between two streams.

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::common::Result;

/// Bytes moved by [`forward`] in each direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transferred {
    pub client_to_target: u64,
    pub target_to_client: u64,
}

/// Forward data between two streams until both directions are closed
///
/// When one side stops sending, the write half of the other side is shut
/// down so the close propagates.
///
/// # Parameters
///
/// * `client` - Stream of the connection that was accepted or opened
/// * `target` - Stream it is bridged to
/// * `buffer_size` - Size of each direction's copy buffer
pub async fn forward<A, B>(client: A, target: B, buffer_size: usize) -> Result<Transferred>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (client_reader, client_writer) = tokio::io::split(client);
    let (target_reader, target_writer) = tokio::io::split(target);

    let (client_to_target, target_to_client) = tokio::join!(
        copy_half(client_reader, target_writer, buffer_size),
        copy_half(target_reader, client_writer, buffer_size),
    );

    debug!("Client to target transferred {} bytes total", client_to_target);
    debug!("Target to client transferred {} bytes total", target_to_client);
    Ok(Transferred { client_to_target, target_to_client })
}

async fn copy_half<R, W>(mut reader: ReadHalf<R>, mut writer: WriteHalf<W>, buffer_size: usize) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size];
    let mut total_bytes = 0u64;

    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                total_bytes += n as u64;
                if writer.write_all(&buffer[..n]).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Read error while forwarding: {}", e);
                break;
            }
        }
    }

    let _ = writer.shutdown().await;
    total_bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forward_both_directions() {
        let (client, mut client_peer) = tokio::io::duplex(1024);
        let (target, mut target_peer) = tokio::io::duplex(1024);

        let bridge = tokio::spawn(forward(client, target, 16));

        client_peer.write_all(b"request bytes longer than the buffer").await.unwrap();
        let mut request = vec![0u8; 36];
        target_peer.read_exact(&mut request).await.unwrap();
        assert_eq!(&request, b"request bytes longer than the buffer");

        target_peer.write_all(b"response").await.unwrap();
        let mut response = [0u8; 8];
        client_peer.read_exact(&mut response).await.unwrap();
        assert_eq!(&response, b"response");

        drop(client_peer);
        drop(target_peer);
        let transferred = bridge.await.unwrap().unwrap();
        assert_eq!(transferred, Transferred { client_to_target: 36, target_to_client: 8 });
    }
}
