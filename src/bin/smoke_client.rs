use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "smoke-client")]
#[command(about = "Connects to a running game server and validates a player session token")]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "1935")]
    port: u16,

    /// Player session token to present
    #[arg(short, long)]
    token: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    println!("🔌 Connecting to {}", addr);
    let mut stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("could not connect to {} (is the game server running?)", addr))?;

    stream
        .write_all(format!("{}\n", args.token).as_bytes())
        .await
        .context("failed to send session token")?;

    let mut buffer = [0u8; 256];
    let read = stream
        .read(&mut buffer)
        .await
        .context("failed to read the server's reply")?;
    let reply = String::from_utf8_lossy(&buffer[..read]);

    println!("📥 Server replied: {}", reply);
    if reply.contains("accepted") {
        println!("✅ Token accepted");
        Ok(())
    } else {
        eprintln!("❌ Token rejected");
        std::process::exit(1);
    }
}
