use clap::Parser;

use mountaintops_bridge::Bridge;
use mountaintops_bridge::error::BridgeError;
use mountaintops_bridge::explorer::Explorer;
use mountaintops_bridge::wallet_client::WalletClient;

mod cli;

use cli::{CliArgs, Command, resolve_config};

fn main() -> Result<(), BridgeError> {
    env_logger::init();

    let args = CliArgs::parse();
    log::info!("starting with arguments: {:?}", args);

    let config = resolve_config(&args)?;
    log::debug!("resolved config: {:?}", config);

    let wallet = WalletClient::new(&config.wallet_url, &config.originator, config.request_timeout())?;
    let explorer = Explorer::new(&config.explorer_url, config.request_timeout())?;
    let mut bridge = Bridge::connect(wallet, explorer)?;

    match args.command {
        Command::Address => {
            let address = bridge.address()?;
            println!("{}", address);
        }
        Command::Balance => {
            let address = bridge.address()?;
            let balance = bridge.refresh_balance()?;
            println!(
                "{}: {} BSV ({} confirmed, {} unconfirmed sats)",
                address,
                balance.to_bsv(),
                balance.confirmed,
                balance.unconfirmed
            );
        }
        Command::Import => {
            bridge.address()?;
            let balance = bridge.refresh_balance()?;
            log::info!("importing {} sats", balance.total_sats());
            let outcome = bridge.import()?;
            match outcome.txid {
                Some(txid) => println!("imported {} outputs in {}", outcome.signed_inputs, txid),
                None => println!("imported {} outputs", outcome.signed_inputs),
            }
        }
        Command::Send { to, amount } => {
            let txid = bridge.send(&to, amount)?;
            println!("{}", txid);
        }
    }

    log::info!("done");
    Ok(())
}
