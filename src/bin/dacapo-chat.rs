use clap::Parser;
use dacapo_chat::renderer::{ Renderer, SendOutcome, TranscriptView };
use dotenv::dotenv;
use log::debug;
use std::error::Error;
use std::io::{ self, Write };
use tokio::io::{ AsyncBufReadExt, BufReader };

/// Terminal client for the DaCapo SLO chat server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct ClientArgs {
    /// Base URL of the chat server.
    #[arg(long, env = "DACAPO_SERVER", default_value = "http://localhost:3000")]
    server: String,
}

struct TerminalView {
    out: io::Stdout,
    streaming: bool,
}

impl TerminalView {
    fn new() -> Self {
        Self { out: io::stdout(), streaming: false }
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
        let _ = self.out.flush();
    }
}

impl TranscriptView for TerminalView {
    fn show_user(&mut self, text: &str) {
        debug!("user: {}", text);
    }

    fn append(&mut self, fragment: &str) {
        if !self.streaming {
            let _ = write!(self.out, "assistent> ");
            self.streaming = true;
        }
        let _ = write!(self.out, "{}", fragment);
    }

    fn scroll_to_end(&mut self) {
        let _ = self.out.flush();
    }

    fn end_assistant(&mut self) {
        if self.streaming {
            self.line("");
            self.streaming = false;
        }
    }

    fn offer_export(&mut self) {
        self.line("(Deze resultaten kunnen worden geëxporteerd; typ /history om het gesprek te bekijken.)");
    }

    fn show_error(&mut self, message: &str) {
        self.line(&format!("❌ {}", message));
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        if enabled {
            let _ = write!(self.out, "jij> ");
            let _ = self.out.flush();
        }
    }
}

fn parse_pairs(input: &str) -> Vec<(String, String)> {
    input
        .split_whitespace()
        .filter_map(|pair| {
            let mut kv = pair.splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some(k), Some(v)) if !k.is_empty() => Some((k.to_string(), v.to_string())),
                _ => None,
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = ClientArgs::parse();

    let renderer = Renderer::new(&args.server, TerminalView::new())?;
    println!("DaCapo Chat — verbonden met {}. Commando's: /history, /slo key=value ..., /quit", args.server);
    print!("jij> ");
    io::stdout().flush()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {
                print!("jij> ");
                io::stdout().flush()?;
            }
            "/quit" => break,
            "/history" => {
                for turn in renderer.session().history() {
                    println!("[{}] {}", turn.role, turn.content);
                }
                print!("jij> ");
                io::stdout().flush()?;
            }
            cmd if cmd.starts_with("/slo") => {
                let params = parse_pairs(cmd.trim_start_matches("/slo"));
                match renderer.fetch_curriculum(&params).await {
                    Ok(data) => println!("{}", serde_json::to_string_pretty(&data)?),
                    Err(e) => println!("❌ {}", e),
                }
                print!("jij> ");
                io::stdout().flush()?;
            }
            text => {
                if renderer.send(text).await == SendOutcome::Ignored {
                    debug!("Input ignored");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_pairs() {
        let pairs = parse_pairs(" subject=Wiskunde type=domeinen junk =x");
        assert_eq!(pairs, vec![
            ("subject".to_string(), "Wiskunde".to_string()),
            ("type".to_string(), "domeinen".to_string())
        ]);
    }
}
