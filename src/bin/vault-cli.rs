use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

use vault_gateway::blockchain::transaction::{GAMMA_WEI, THETA_WEI};
use vault_gateway::gateway::args::{CoinArg, OutputArg, SendArgs, GET_ACCOUNT, SEND};
use vault_gateway::http::X_AUTH_USER;
use vault_gateway::vault::PrivateKey;

#[derive(Parser)]
#[command(name = "vault-cli")]
#[command(about = "Command-line client for the vault gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:9900/rpc")]
    url: String,

    /// Identity presented to the gateway (normally set by the auth layer)
    #[arg(long, default_value = "")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the caller's on-chain account
    Account,
    /// Transfer ThetaWei / GammaWei to one address
    Send {
        #[arg(long)]
        to: String,
        #[arg(long, default_value_t = 0)]
        theta: u64,
        #[arg(long, default_value_t = 0)]
        tfuel: u64,
        /// Fee in GammaWei
        #[arg(long, default_value_t = 1_000_000_000_000)]
        fee: u64,
        #[arg(long, default_value_t = 1)]
        gas: u64,
        /// Defaults to the account's next sequence
        #[arg(long)]
        sequence: Option<u64>,
    },
    /// Generate a key locally and print its address and recovery phrase
    Keygen,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (method, params) = match cli.command {
        Commands::Keygen => return keygen(),
        Commands::Account => (GET_ACCOUNT, json!({})),
        Commands::Send {
            to,
            theta,
            tfuel,
            fee,
            gas,
            sequence,
        } => {
            let coins = transfer_coins(theta, tfuel);
            if coins.is_empty() {
                return Err("send needs a non-zero --theta and/or --tfuel".into());
            }
            let args = SendArgs {
                to: vec![OutputArg { address: to, coins }],
                fee: CoinArg {
                    denom: GAMMA_WEI.to_string(),
                    amount: fee,
                },
                gas,
                sequence,
            };
            (SEND, serde_json::to_value(args)?)
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(X_AUTH_USER, HeaderValue::from_str(&cli.user)?);

    let body = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": [params],
        "id": 1,
    });
    let res = reqwest::Client::new()
        .post(&cli.url)
        .headers(headers)
        .json(&body)
        .send()
        .await?;
    print_response(res).await
}

/// Coins for a transfer; zero amounts are left out.
fn transfer_coins(theta: u64, tfuel: u64) -> Vec<CoinArg> {
    [(THETA_WEI, theta), (GAMMA_WEI, tfuel)]
        .into_iter()
        .filter(|(_, amount)| *amount > 0)
        .map(|(denom, amount)| CoinArg {
            denom: denom.to_string(),
            amount,
        })
        .collect()
}

fn keygen() -> Result<(), Box<dyn std::error::Error>> {
    let private_key = PrivateKey::generate()?;
    let public_key = private_key.public_key();
    let phrase = private_key.recovery_phrase()?;

    println!("address:         {}", public_key.address());
    println!("public key:      {}", hex::encode(public_key.as_bytes()));
    println!("recovery phrase: {}", phrase.as_str());
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    if let Some(error) = json.get("error") {
        eprintln!("Error: {}", serde_json::to_string_pretty(error)?);
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&json["result"])?);
    Ok(())
}
