//! CLI channel: stdin/stdout REPL with a booking-aware prompt.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::booking::BookingPhase;
use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

/// Reads one message per stdin line and prints replies to stdout.
pub struct CliChannel {
    user_id: String,
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            user_id: "local-user".to_string(),
        }
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let user_id = self.user_id.clone();

        tokio::spawn(async move {
            let reader = BufReader::new(tokio::io::stdin());
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let msg = IncomingMessage::new("cli", user_id.as_str(), line);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}\n", response.content);
        if let Some(status) = booking_status(response.phase, response.booking_id) {
            eprintln!("{status}");
        }
        eprint!("{}", prompt_for(response.phase));
        Ok(())
    }
}

/// One-line booking progress shown under a reply.
fn booking_status(phase: Option<BookingPhase>, booking_id: Option<i64>) -> Option<String> {
    let line = match phase? {
        BookingPhase::Collecting => "📝 Booking in progress".to_string(),
        BookingPhase::AwaitingConfirmation => {
            "📋 Awaiting confirmation: type 'confirm' or 'cancel'".to_string()
        }
        BookingPhase::Committed => match booking_id {
            Some(id) => format!("✅ Booking #{id} saved"),
            None => "✅ Booking saved".to_string(),
        },
        BookingPhase::Cancelled => "❌ Booking cancelled".to_string(),
    };
    Some(line)
}

/// Prompt printed after a reply. Open bookings get their own.
fn prompt_for(phase: Option<BookingPhase>) -> &'static str {
    match phase {
        Some(BookingPhase::Collecting | BookingPhase::AwaitingConfirmation) => "booking> ",
        _ => "> ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_booking_phase() {
        assert_eq!(booking_status(None, None), None);
        assert_eq!(
            booking_status(Some(BookingPhase::Committed), Some(7)).as_deref(),
            Some("✅ Booking #7 saved")
        );
        assert!(
            booking_status(Some(BookingPhase::AwaitingConfirmation), None)
                .unwrap()
                .contains("'confirm'")
        );
        assert_eq!(
            booking_status(Some(BookingPhase::Cancelled), None).as_deref(),
            Some("❌ Booking cancelled")
        );
    }

    #[test]
    fn prompt_marks_open_bookings() {
        assert_eq!(prompt_for(Some(BookingPhase::Collecting)), "booking> ");
        assert_eq!(prompt_for(Some(BookingPhase::AwaitingConfirmation)), "booking> ");
        assert_eq!(prompt_for(Some(BookingPhase::Committed)), "> ");
        assert_eq!(prompt_for(None), "> ");
    }
}
