//! Connects to a reliable-datagram echo server and round-trips stdin lines.
//!
//! Run with `RUST_LOG=trace` to watch the protocol exchange.

use core::time::Duration;
use std::io::BufRead;
use std::sync::Arc;

fn main() -> std::io::Result<()> {
    env_logger::init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:6920".into())
        .parse()
        .expect("expected a <ip>:<port> argument");

    let conn = Arc::new(rudp_client::Conn::bind("0.0.0.0:0")?);

    let worker = Arc::clone(&conn);
    std::thread::spawn(move || worker.run());

    conn.connect(addr, Duration::from_secs(5))
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    println!("connected to {addr}");

    let mut reply = [0u8; rudp_client::proto::MAX_PAYLOAD];
    for line in std::io::stdin().lock().lines() {
        let line = line?;

        if let Err(e) = conn.send(line.as_bytes(), Duration::from_secs(5)) {
            eprintln!("send failed: {e}");
            break;
        }

        match conn.recv(&mut reply, Duration::from_secs(5)) {
            Ok(n) => println!("{}", String::from_utf8_lossy(&reply[..n])),
            Err(e) => eprintln!("recv failed: {e}"),
        }
    }

    conn.close();
    Ok(())
}
