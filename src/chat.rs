// Terminal front-end: the same session flow as the web UI, driven from stdin.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::error::SubmitError;
use crate::session::ChatSession;

const HELP: &str = "Type a message and press Enter. /reset clears the conversation, /quit exits.";

/// Read lines from `input` until EOF or `/quit`, writing replies to `output`.
pub async fn run_chat<R, W>(session: &ChatSession, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Starting terminal chat...");
    output.write_all(format!("{}\n", HELP).as_bytes()).await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset().await?;
                output.write_all(b"Conversation cleared.\n").await?;
                continue;
            }
            _ => {}
        }

        output.write_all(b"Thinking...\n").await?;
        match session.submit(&line).await {
            Ok(turn) => {
                output.write_all(format!("{}\n\n", turn.content()).as_bytes()).await?;
            }
            Err(SubmitError::EmptyInput) => {}
            Err(e) => {
                output.write_all(format!("Error: {}\n", e).as_bytes()).await?;
            }
        }
    }

    info!("Terminal chat finished.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionClient, CompletionRequest};
    use crate::conversation::Turn;
    use crate::error::{CompletionError, CompletionErrorKind};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoClient;

    #[async_trait]
    impl CompletionClient for EchoClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            let last = request.messages.last().map(|t| t.content().to_string()).unwrap_or_default();
            if last == "fail" {
                return Err(CompletionError::new(CompletionErrorKind::Network, "offline"));
            }
            Ok(format!("<think>echoing</think>echo: {}", last))
        }
    }

    #[tokio::test]
    async fn test_chat_loop_round_trip() {
        let session = ChatSession::new(Arc::new(EchoClient));
        let input: &[u8] = b"  hi  \n\nfail\n/quit\nnever sent\n";
        let mut output = Vec::new();

        run_chat(&session, input, &mut output).await.unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("echo: hi"));
        assert!(!printed.contains("echoing"));
        assert!(printed.contains("Error: network error: offline"));
        assert_eq!(
            session.snapshot().await,
            vec![Turn::user("hi"), Turn::assistant("echo: hi"), Turn::user("fail")]
        );
    }

    #[tokio::test]
    async fn test_blank_lines_show_no_thinking_indicator() {
        let session = ChatSession::new(Arc::new(EchoClient));
        let input: &[u8] = b"\n   \nhi\n\t\n";
        let mut output = Vec::new();

        run_chat(&session, input, &mut output).await.unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert_eq!(printed.matches("Thinking...").count(), 1);
        assert_eq!(session.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_command() {
        let session = ChatSession::new(Arc::new(EchoClient));
        let input: &[u8] = b"hello\n/reset\n";
        let mut output = Vec::new();

        run_chat(&session, input, &mut output).await.unwrap();

        assert!(String::from_utf8(output).unwrap().contains("Conversation cleared."));
        assert!(session.snapshot().await.is_empty());
    }
}
