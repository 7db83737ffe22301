use anyhow::{Context, Result, bail};
use futures::SinkExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{AttachedProcess, TerminalSize};
use std::io::{Read, Write};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::terminal::{CrosstermTerminal, with_raw_mode};

const CHUNK_SIZE: usize = 4096;

pub fn shell_command() -> Vec<String> {
    vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        "command -v bash >/dev/null 2>&1 && exec bash || exec sh".to_string(),
    ]
}

pub async fn attach(mut attached: AttachedProcess) -> Result<()> {
    let remote_stdin = attached
        .stdin()
        .context("exec session has no stdin stream")?;
    let remote_stdout = attached
        .stdout()
        .context("exec session has no stdout stream")?;
    let status = attached.take_status();

    if let Some(mut resize) = attached.terminal_size()
        && let Ok((width, height)) = crossterm::terminal::size()
        && let Err(error) = resize.send(TerminalSize { width, height }).await
    {
        warn!("unable to send terminal size: {error}");
    }

    let input = spawn_stdin_reader()?;
    let mut terminal = CrosstermTerminal;
    let mut stdout = std::io::stdout();
    with_raw_mode(
        &mut terminal,
        pump(input, remote_stdin, remote_stdout, &mut stdout),
    )
    .await
    .context("unable to execute command")?;

    let outcome = match status {
        Some(status) => status.await,
        None => None,
    };
    attached
        .join()
        .await
        .context("exec session terminated abnormally")?;
    check_exit_status(outcome.as_ref())
}

pub async fn pump<W, R, O>(
    mut input: mpsc::UnboundedReceiver<Vec<u8>>,
    mut remote_stdin: W,
    mut remote_stdout: R,
    local_out: &mut O,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
    O: Write + ?Sized,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut input_open = true;

    loop {
        tokio::select! {
            read = remote_stdout.read(&mut buf) => {
                let n = read.context("remote output stream failed")?;
                if n == 0 {
                    debug!("remote output closed");
                    break;
                }
                local_out
                    .write_all(&buf[..n])
                    .context("failed to write remote output")?;
                local_out.flush().context("failed to flush remote output")?;
            }
            chunk = input.recv(), if input_open => match chunk {
                Some(bytes) => remote_stdin
                    .write_all(&bytes)
                    .await
                    .context("failed to send input to remote shell")?,
                None => {
                    debug!("local input closed");
                    input_open = false;
                    if let Err(error) = remote_stdin.shutdown().await {
                        debug!("could not close remote input: {error}");
                    }
                }
            },
        }
    }

    Ok(())
}

fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<Vec<u8>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("kubenav-stdin".to_string())
        .spawn(move || {
            let mut stdin = std::io::stdin().lock();
            let mut buf = [0u8; CHUNK_SIZE];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(error) if error.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(error) => {
                        debug!("stdin read failed: {error}");
                        break;
                    }
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}

fn check_exit_status(status: Option<&Status>) -> Result<()> {
    match status {
        Some(status) if status.status.as_deref() == Some("Failure") => bail!(
            "remote shell failed: {}",
            status.message.as_deref().unwrap_or("unknown error")
        ),
        _ => Ok(()),
    }
}
