use crate::ui;
use alloy::primitives::TxHash;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use dapp_console::{
    AppConfig,
    DappController,
    DappError,
    WalletConfig,
    deployment::DeploymentStore,
    rpc_transport::RpcTransport,
    transport::TxReceipt,
    wallets::{
        find_keystore,
        unlock_keystore,
    },
};
use futures::future;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
};
use tokio::time::{
    self,
    MissedTickBehavior,
};
use tracing::{
    debug,
    info,
    warn,
};

type Confirmation = Pin<Box<dyn Future<Output = (TxHash, Result<TxReceipt, DappError>)>>>;

fn idle_confirmation() -> Confirmation {
    Box::pin(future::pending())
}

/// Keystores are unlocked here, before the terminal switches to raw mode, so
/// the password prompt stays usable.
fn build_transport(config: &AppConfig) -> Result<Option<Arc<RpcTransport>>> {
    let rpc_url = config.network.url();
    let transport = match &config.wallet {
        WalletConfig::Keystore { name, dir } => {
            let descriptor = find_keystore(dir, name)?;
            let signer = unlock_keystore(&descriptor)?;
            RpcTransport::with_signer(rpc_url, signer)
                .wrap_err("Failed to build signing provider")?
        }
        WalletConfig::External { url } => {
            RpcTransport::external(url).wrap_err("Failed to reach wallet endpoint")?
        }
        WalletConfig::None => {
            warn!("no wallet configured");
            return Ok(None);
        }
    };
    Ok(Some(Arc::new(transport)))
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let store = DeploymentStore::new(config.network.deployment_env())?;
    let (contract, from_block) = config.resolve_contract(&store)?;
    info!(variant = %config.variant, %contract, from_block, "starting dapp console");
    let transport = build_transport(&config)?;
    let mut controller = DappController::new(
        transport,
        config.controller_config(contract, from_block),
    );
    let mut ui_state = ui::UiState::new(config.variant);
    let mut input_events = ui::input_event_stream();

    ui::terminal_enter(&mut ui_state)?;
    tracing::info!("UI ready");
    let res = run_loop(&mut controller, &mut ui_state, &mut input_events, &config).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop(
    controller: &mut DappController<RpcTransport>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEvents,
    config: &AppConfig,
) -> Result<()> {
    let mut ticker = time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut confirmation = idle_confirmation();

    ui::draw(ui_state, &controller.view())?;
    if let Err(err) = controller.connect().await {
        debug!(error = %err, "initial connect failed");
    }
    ui::draw(ui_state, &controller.view())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => { break; }
            _ = ticker.tick() => {
                if let Err(err) = controller.tick().await {
                    debug!(error = %err, "tick failed");
                }
            }
            (hash, outcome) = &mut confirmation => {
                confirmation = idle_confirmation();
                let _ = controller.finish_transaction(hash, outcome).await;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev.wrap_err("reading terminal input failed")?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Connect => {
                        confirmation = idle_confirmation();
                        let _ = controller.connect().await;
                    }
                    ui::UserEvent::Disconnect => {
                        confirmation = idle_confirmation();
                        controller.disconnect();
                    }
                    ui::UserEvent::Refresh => { let _ = controller.refresh().await; }
                    ui::UserEvent::NextOption => controller.select_next_option(),
                    ui::UserEvent::PrevOption => controller.select_prev_option(),
                    ui::UserEvent::WatchSpender(spender) => {
                        let _ = controller.set_spender(&spender).await;
                    }
                    ui::UserEvent::DeclineSignature => controller.reject_signature(),
                    ui::UserEvent::Sign(intent) => {
                        let submitted = match intent {
                            ui::SignIntent::Vote { .. } => controller.submit_vote().await,
                            ui::SignIntent::SetVotingActive(active) => {
                                controller.submit_set_voting_active(active).await
                            }
                            ui::SignIntent::Transfer { to, amount } => {
                                controller.submit_transfer(&to, &amount).await
                            }
                            ui::SignIntent::Approve { spender, amount } => {
                                controller.submit_approve(&spender, &amount).await
                            }
                        };
                        if submitted.is_ok() {
                            if let Some(pending) = controller.confirmation() {
                                confirmation = Box::pin(pending);
                            }
                        }
                    }
                    ui::UserEvent::Redraw => {}
                }
            }
        }
        ui::draw(ui_state, &controller.view()).wrap_err("draw failed")?;
    }
    Ok(())
}
