use anyhow::{Context, Result};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::future::Future;
use tracing::{debug, warn};

pub trait TerminalControl {
    fn enter_raw_mode(&mut self) -> Result<()>;
    fn restore(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct CrosstermTerminal;

impl TerminalControl for CrosstermTerminal {
    fn enter_raw_mode(&mut self) -> Result<()> {
        enable_raw_mode().context("failed to enable raw mode")
    }

    fn restore(&mut self) -> Result<()> {
        disable_raw_mode().context("failed to disable raw mode")
    }
}

pub struct RawModeGuard<'a, T: TerminalControl + ?Sized> {
    terminal: &'a mut T,
}

impl<'a, T: TerminalControl + ?Sized> RawModeGuard<'a, T> {
    pub fn enter(terminal: &'a mut T) -> Result<Self> {
        terminal.enter_raw_mode()?;
        debug!("terminal switched to raw mode");
        Ok(Self { terminal })
    }
}

impl<T: TerminalControl + ?Sized> Drop for RawModeGuard<'_, T> {
    fn drop(&mut self) {
        match self.terminal.restore() {
            Ok(()) => debug!("terminal restored"),
            Err(error) => warn!("unable to restore terminal: {error:#}"),
        }
    }
}

pub async fn with_raw_mode<T, F, R>(terminal: &mut T, session: F) -> Result<R>
where
    T: TerminalControl + ?Sized,
    F: Future<Output = Result<R>>,
{
    let _guard = RawModeGuard::enter(terminal)?;
    session.await
}


#[cfg(test)]
mod tests {
    use super::testing::FakeTerminal;
    use super::{RawModeGuard, with_raw_mode};
    use anyhow::anyhow;

    #[tokio::test]
    async fn restores_after_success() {
        let mut terminal = FakeTerminal::default();
        let value = with_raw_mode(&mut terminal, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert!(!terminal.raw);
        assert_eq!((terminal.entered, terminal.restored), (1, 1));
    }

    #[tokio::test]
    async fn restores_after_failure() {
        let mut terminal = FakeTerminal::default();
        let result: anyhow::Result<()> =
            with_raw_mode(&mut terminal, async { Err(anyhow!("stream reset")) }).await;
        assert_eq!(result.unwrap_err().to_string(), "stream reset");
        assert!(!terminal.raw);
        assert_eq!(terminal.restored, 1);
    }

    #[tokio::test]
    async fn restore_failure_does_not_mask_result() {
        let mut terminal = FakeTerminal {
            fail_restore: true,
            ..FakeTerminal::default()
        };
        let value = with_raw_mode(&mut terminal, async { Ok("done") })
            .await
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(terminal.restored, 1);
    }

    #[tokio::test]
    async fn failed_enter_skips_session_and_restore() {
        let mut terminal = FakeTerminal {
            fail_enter: true,
            ..FakeTerminal::default()
        };
        let mut ran = false;
        let result = with_raw_mode(&mut terminal, async {
            ran = true;
            Ok(())
        })
        .await;
        assert!(result.is_err());
        assert!(!ran);
        assert_eq!(terminal.restored, 0);
    }

    #[test]
    fn guard_restores_during_unwind() {
        let mut terminal = FakeTerminal::default();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = RawModeGuard::enter(&mut terminal).unwrap();
            panic!("session blew up");
        }));
        assert!(outcome.is_err());
        assert!(!terminal.raw);
        assert_eq!(terminal.restored, 1);
    }
}
