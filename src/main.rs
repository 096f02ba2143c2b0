mod options;

use crate::options::{ApprovalCommands, ApprovalOptions};
use actix_web::Scope;
use actix_web::{web, App, HttpServer};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use structopt::StructOpt;
use tokio::sync::mpsc;
use web3::types::{Address, U256};

use wallet_approval_lib::advisory::{AdvisoryApi, HttpAdvisoryClient};
use wallet_approval_lib::approval::run_approval_flow;
use wallet_approval_lib::runtime::{start_approval_engine, ApprovalRuntime, RuntimeOptions};
use wallet_approval_lib::server::*;
use wallet_approval_lib::sim::{SimEvmWallet, SimRelayConnector, SimTronProvider, StaticAdvisory};
use wallet_approval_lib::{
    config,
    contracts::encode_erc20_approve,
    err_custom_create, err_from,
    error::{ApprovalError, ErrorBag},
    orchestrator::EngineTransports,
    setup::ApprovalSetup,
};
use wallet_approval_lib_common::{ChainFamily, ConnectionMethod, OrchestratorEvent};

const SIM_EVM_ADDRESS: &str = "0xc596aee002ebe98345ce3f967631aaf79cfbdf41";
const SIM_TRON_ADDRESS: &str = "TFJf1T5rY3QHYAByMDF4nXfJKXKQ4mLnVp";
const SIM_EVM_TOKEN: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
const SIM_TRON_TOKEN: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

/// Scripted session exercising both families against the simulated
/// transports: connect, approve and report on EVM, then the same on Tron
/// after the extension "unlocks".
async fn run_simulated_session(
    rt: &ApprovalRuntime,
    tron_injected: Arc<SimTronProvider>,
    advisory: Arc<StaticAdvisory>,
) -> Result<(), ApprovalError> {
    log::info!("simulated session: connecting EVM wallet");
    {
        let mut orchestrator = rt.shared_state.lock().await;
        orchestrator.open_dialog().await;
        orchestrator.connect_evm("injected").await?;
    }
    run_approval_flow(rt.shared_state.clone()).await?;

    log::info!("simulated session: switching to Tron tab");
    {
        let mut orchestrator = rt.shared_state.lock().await;
        orchestrator.switch_tab(ChainFamily::Tron).await;
    }

    // the user unlocks the extension, then clicks connect
    advisory.set_tokens(vec![SIM_TRON_TOKEN]);
    tron_injected.set_ready(true);
    tron_injected.set_address(Some(SIM_TRON_ADDRESS));
    {
        let mut orchestrator = rt.shared_state.lock().await;
        orchestrator.connect_tron(ConnectionMethod::Injected).await?;
    }
    run_approval_flow(rt.shared_state.clone()).await?;

    let snapshot = rt.shared_state.lock().await.snapshot();
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).map_err(|err| err_custom_create!(
            "Something went wrong when serializing to json {err}"
        ))?
    );
    Ok(())
}

async fn main_internal() -> Result<(), ApprovalError> {
    dotenv::dotenv().ok();
    env::set_var(
        "RUST_LOG",
        env::var("RUST_LOG").unwrap_or("info,web3=warn".to_string()),
    );

    env_logger::init();
    let cli: ApprovalOptions = ApprovalOptions::from_args();

    let config = config::Config::load(&cli.config).await?;

    match cli.commands {
        ApprovalCommands::Run { run_options } => {
            if run_options.http && !run_options.keep_running {
                return Err(err_custom_create!("http mode requires keep-running option"));
            }
            if !run_options.simulate {
                return Err(err_custom_create!(
                    "no wallet transport backend is wired in, run with --simulate"
                ));
            }

            let tron_injected = Arc::new(SimTronProvider::locked());
            let advisory = Arc::new(StaticAdvisory::new(vec![SIM_EVM_TOKEN]));
            let evm_address = Address::from_str(SIM_EVM_ADDRESS).map_err(err_from!())?;
            let transports = EngineTransports {
                tron_injected: tron_injected.clone(),
                tron_relay_connector: Arc::new(SimRelayConnector::new(SIM_TRON_ADDRESS)),
                evm_wallet: Arc::new(SimEvmWallet::new(evm_address)),
                advisory: advisory.clone(),
            };

            let (event_sender, mut event_receiver) = mpsc::channel::<OrchestratorEvent>(50);
            tokio::spawn(async move {
                while let Some(event) = event_receiver.recv().await {
                    match serde_json::to_string(&event.content) {
                        Ok(json) => log::info!("engine event: {json}"),
                        Err(err) => log::warn!("engine event not serializable: {err}"),
                    }
                }
            });

            let mut rt = start_approval_engine(
                &config,
                transports,
                Some(event_sender),
                RuntimeOptions::default(),
            )
            .await?;

            run_simulated_session(&rt, tron_injected, advisory).await?;

            let server_data = web::Data::new(Box::new(ServerData {
                shared_state: rt.shared_state.clone(),
                setup: rt.setup.clone(),
            }));

            if run_options.http {
                let server = HttpServer::new(move || {
                    let cors = actix_cors::Cors::default()
                        .allow_any_origin()
                        .allow_any_method()
                        .allow_any_header()
                        .max_age(3600);

                    let scope = runtime_web_scope(Scope::new("approval"), server_data.clone());

                    App::new().wrap(cors).service(scope)
                })
                .workers(run_options.http_threads as usize)
                .bind((run_options.http_addr.as_str(), run_options.http_port))
                .expect("Cannot run server")
                .run();

                log::info!(
                    "http server starting on {}:{}",
                    run_options.http_addr,
                    run_options.http_port
                );

                server.await.unwrap();
            } else if run_options.keep_running {
                rt.join().await;
            } else {
                rt.stop();
            }
        }
        ApprovalCommands::CheckAdvisory {
            check_advisory_options,
        } => {
            let chain_cfg = config
                .chain
                .get(&check_advisory_options.chain_name)
                .ok_or(err_custom_create!(
                    "Chain {} not found in config file",
                    check_advisory_options.chain_name
                ))?;

            let setup = ApprovalSetup::new(&config)?;
            let client = HttpAdvisoryClient::from_setup(&setup)?;
            match client
                .fetch_target(&check_advisory_options.wallet_address, chain_cfg.chain_id)
                .await?
            {
                Some(token) => println!("Token needing allowance: {token}"),
                None => println!("No tokens need an allowance"),
            }
        }
        ApprovalCommands::EncodeApprove {
            encode_approve_options,
        } => {
            let amount =
                U256::from_dec_str(&encode_approve_options.amount).map_err(err_from!())?;
            let calldata = encode_erc20_approve(encode_approve_options.spender, amount)
                .map_err(err_from!())?;
            println!("0x{}", hex::encode(calldata));
        }
        ApprovalCommands::DecodeConfig => {
            let setup = ApprovalSetup::new(&config)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&setup).map_err(|err| err_custom_create!(
                    "Something went wrong when serializing to json {err}"
                ))?
            );
        }
    }

    Ok(())
}

#[actix_web::main]
async fn main() -> Result<(), ApprovalError> {
    match main_internal().await {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("Error: {e}");
            Err(e)
        }
    }
}
