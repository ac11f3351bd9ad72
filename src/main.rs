mod main_runtime;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use clap::Parser;
use rust_decimal::Decimal;
use synchro::adapters::{AlloyRpc, TokenReader};
use synchro::cli::output::{self, AttestationRow, InstrumentRow, OutputMode};
use synchro::cli::{Cli, Commands};
use synchro::config::AppConfig;
use synchro::coordination::CancelHandle;
use synchro::domain::{
    from_raw_units, to_raw_units, AccountContext, Direction, TradeDirection, TradeRequest,
    TypedField,
};
use synchro::error::{Result, SynchroError, TradeError};
use synchro::services::{parse_amount, trade_summary, TradeAmountCalculator};
use tracing::{info, warn};

use main_runtime::{connect_wallet, init_logging, init_logging_simple, Runtime};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mode = OutputMode::from_json_flag(cli.json);

    if let Commands::Amounts {
        direction,
        field,
        amount,
        price,
        fee,
        collateral_decimals,
        synthetic_decimals,
    } = &cli.command
    {
        init_logging_simple();
        let calculator = TradeAmountCalculator::new(*collateral_decimals, *synthetic_decimals);
        return run_amounts(&calculator, *direction, *field, amount, price, *fee, mode);
    }

    let config = AppConfig::load_from(&cli.config)?;
    if let Err(errors) = config.validate() {
        for e in &errors {
            output::print_error(e);
        }
        return Err(SynchroError::Validation(errors.join("; ")));
    }

    match cli.command {
        Commands::Instruments { chain } => {
            init_logging_simple();
            let rt = Runtime::build(config)?;
            run_instruments(&rt, chain, mode).await?;
        }
        Commands::Signatures {
            chain,
            instrument,
            direction,
        } => {
            init_logging_simple();
            let rt = Runtime::build(config)?;
            run_signatures(&rt, chain, instrument, direction, mode).await?;
        }
        Commands::Trade {
            chain,
            symbol,
            side,
            direction,
            field,
            amount,
            dry_run,
            yes,
        } => {
            init_logging(&config);
            let rt = Runtime::build(config)?;
            let request = TradeArgs {
                chain_id: chain,
                symbol,
                side,
                direction,
                field,
                amount,
            };
            run_trade(&rt, request, dry_run, yes, mode).await?;
        }
        Commands::Approve {
            chain,
            token,
            amount,
        } => {
            init_logging(&config);
            let rt = Runtime::build(config)?;
            run_approve(&rt, chain, &token, &amount).await?;
        }
        Commands::Watch { chain } => {
            init_logging(&config);
            let rt = Runtime::build(config)?;
            run_watch(&rt, chain).await?;
        }
        Commands::Amounts { .. } => {}
    }

    Ok(())
}

struct TradeArgs {
    chain_id: u64,
    symbol: String,
    side: Direction,
    direction: TradeDirection,
    field: TypedField,
    amount: String,
}

fn run_amounts(
    calculator: &TradeAmountCalculator,
    direction: TradeDirection,
    field: TypedField,
    amount: &str,
    price: &str,
    fee: Decimal,
    mode: OutputMode,
) -> Result<()> {
    let amounts = calculator.compute(direction, field, amount, price, fee)?;
    match mode {
        OutputMode::Json => output::print_item(&amounts)?,
        OutputMode::Table => {
            output::print_kv("direction", direction.as_str());
            output::print_kv("amount_in", &amounts.amount_in.normalize().to_string());
            output::print_kv("amount_out", &amounts.amount_out.normalize().to_string());
            output::print_kv("fee", &amounts.fee_amount.normalize().to_string());
        }
    }
    Ok(())
}

async fn run_instruments(rt: &Runtime, chain_id: u64, mode: OutputMode) -> Result<()> {
    rt.chain(chain_id)?;
    rt.refresh(chain_id).await?;

    let instruments = rt.quotes.instruments(chain_id).await;
    let rows: Vec<InstrumentRow> = instruments.iter().map(InstrumentRow::from).collect();
    output::print_items(&rows, mode)?;
    Ok(())
}

async fn run_signatures(
    rt: &Runtime,
    chain_id: u64,
    instrument: Address,
    direction: TradeDirection,
    mode: OutputMode,
) -> Result<()> {
    let responses = rt.aggregator.fetch_signatures(chain_id).await?;
    let selection = rt
        .aggregator
        .select_signatures(&responses, instrument, direction)?;

    if mode == OutputMode::Json {
        output::print_item(&selection)?;
        return Ok(());
    }

    let reachable = responses.iter().filter(|r| r.is_available()).count();
    output::print_kv("gateways", &format!("{}/{}", reachable, responses.len()));
    output::print_kv(
        "price",
        selection.price.as_deref().unwrap_or("(derived on-chain)"),
    );
    let rows: Vec<AttestationRow> = selection
        .data
        .iter()
        .map(|a| AttestationRow::new(a, direction))
        .collect();
    output::print_items(&rows, mode)?;
    Ok(())
}

async fn run_trade(
    rt: &Runtime,
    args: TradeArgs,
    dry_run: bool,
    yes: bool,
    mode: OutputMode,
) -> Result<()> {
    let chain = rt.chain(args.chain_id)?;
    rt.quotes.refresh_chain(args.chain_id).await?;
    let instrument = rt
        .quotes
        .instrument(args.chain_id, &args.symbol, args.side)
        .await
        .ok_or_else(|| {
            SynchroError::InstrumentNotFound(format!("{}-{}", args.symbol, args.side.suffix()))
        })?;

    let request = TradeRequest {
        chain_id: args.chain_id,
        instrument: instrument.address,
        direction: args.direction,
        field: args.field,
        amount: args.amount,
    };

    if dry_run {
        let rpc = Arc::new(AlloyRpc::connect(&chain.rpc_url, chain.chain_id)?);
        let pipeline = rt.pipeline(chain, rt.submitter(rpc));
        let preview = pipeline.preview(&request).await?;

        match mode {
            OutputMode::Json => output::print_item(&serde_json::json!({
                "summary": preview.summary,
                "amounts": preview.amounts,
                "price": preview.price,
                "signatures": preview.signatures,
            }))?,
            OutputMode::Table => {
                output::print_kv("summary", &preview.summary);
                output::print_kv("instrument", &preview.instrument_symbol);
                output::print_kv(
                    "price",
                    preview.price.as_deref().unwrap_or("(derived on-chain)"),
                );
                output::print_kv("signatures", &preview.signatures.to_string());
                output::print_kv("fee", &preview.amounts.fee_amount.normalize().to_string());
                output::print_warn("Dry run: nothing was sent");
            }
        }
        return Ok(());
    }

    let (wallet, rpc) = connect_wallet(&chain)?;
    let account = wallet.address();
    let synthetic_decimals = rt.config.execution.synthetic_decimals;
    let (input_token, input_decimals, input_symbol) = match args.direction {
        TradeDirection::Open => (
            chain.collateral,
            chain.collateral_decimals,
            chain.collateral_symbol.clone(),
        ),
        TradeDirection::Close => (
            instrument.address,
            synthetic_decimals,
            instrument.display_symbol(),
        ),
    };

    let balance_raw = rpc
        .balance_of(input_token, account)
        .await
        .map_err(|e| SynchroError::Rpc(format!("balance read failed: {}", e)))?;
    let ctx = AccountContext {
        account: Some(account),
        chain_id: Some(chain.chain_id),
        balance: from_raw_units(balance_raw, input_decimals)?,
    };

    // Local estimate for the allowance check and the confirmation prompt
    let calculator = TradeAmountCalculator::new(chain.collateral_decimals, synthetic_decimals);
    let amounts = calculator.compute(
        request.direction,
        request.field,
        &request.amount,
        &instrument.price,
        instrument.fee,
    )?;
    let allowance = rpc
        .allowance(input_token, account, chain.synchronizer)
        .await
        .map_err(|e| SynchroError::Rpc(format!("allowance read failed: {}", e)))?;
    if allowance < amounts.amount_in_raw()? {
        output::print_warn(&format!(
            "{} allowance is below {}; run `synchro approve --chain {}` first",
            input_symbol,
            amounts.amount_in.normalize(),
            chain.chain_id
        ));
    }

    let summary = trade_summary(&amounts, &instrument.display_symbol(), &chain.collateral_symbol);
    if !yes && !output::confirm(&format!("{}?", summary)) {
        output::print_warn("Aborted");
        return Ok(());
    }

    let (handle, cancel) = CancelHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let submitter = rt.submitter(rpc);
    let pipeline = rt.pipeline(chain, submitter);
    match pipeline.execute(&request, &ctx, &cancel).await {
        Ok(receipt) => {
            let hash = receipt
                .tx_hash
                .map(|h| h.to_string())
                .unwrap_or_default();
            match mode {
                OutputMode::Json => output::print_item(&serde_json::json!({
                    "attempt_id": receipt.attempt_id,
                    "state": receipt.state.as_str(),
                    "tx_hash": hash,
                    "summary": receipt.summary,
                }))?,
                OutputMode::Table => {
                    output::print_success(receipt.summary.as_deref().unwrap_or("Submitted"));
                    output::print_kv("tx", &hash);
                    output::print_kv("attempt", &receipt.attempt_id.to_string());
                }
            }
            Ok(())
        }
        Err(failure) if failure.is_user_rejection() => {
            output::print_warn("Transaction rejected in wallet");
            Ok(())
        }
        Err(failure) => {
            output::print_error(&failure.to_string());
            Err(failure.source)
        }
    }
}

async fn run_approve(rt: &Runtime, chain_id: u64, token: &str, amount: &str) -> Result<()> {
    let chain = rt.chain(chain_id)?;

    let (token_address, decimals, symbol) = if token.eq_ignore_ascii_case("collateral") {
        (
            chain.collateral,
            chain.collateral_decimals,
            chain.collateral_symbol.clone(),
        )
    } else {
        let address: Address = token
            .parse()
            .map_err(|e| SynchroError::AddressParsing(format!("{}: {}", token, e)))?;
        if let Err(e) = rt.quotes.refresh_chain(chain_id).await {
            warn!("Could not load instrument names: {}", e);
        }
        let symbol = rt
            .quotes
            .instrument_by_address(chain_id, address)
            .await
            .map(|i| i.display_symbol())
            .unwrap_or_else(|| address.to_string());
        (address, rt.config.execution.synthetic_decimals, symbol)
    };

    let raw = if amount.eq_ignore_ascii_case("max") {
        U256::MAX
    } else {
        to_raw_units(parse_amount(amount, decimals)?, decimals)?
    };

    let (wallet, rpc) = connect_wallet(&chain)?;
    let submitter = rt.submitter(rpc);
    match submitter
        .approve(
            chain_id,
            wallet.address(),
            token_address,
            &symbol,
            chain.synchronizer,
            raw,
        )
        .await
    {
        Ok(hash) => {
            output::print_success(&format!("Approve {} submitted", symbol));
            output::print_kv("tx", &hash.to_string());
            Ok(())
        }
        Err(TradeError::UserRejected) => {
            output::print_warn("Approval rejected in wallet");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_watch(rt: &Runtime, chain_id: u64) -> Result<()> {
    rt.chain(chain_id)?;
    let interval = Duration::from_secs(rt.config.quote_feed.refresh_interval_secs.max(1));

    let (handle, token) = CancelHandle::new();
    let refresher = {
        let quotes = rt.quotes.clone();
        tokio::spawn(async move { quotes.run(interval, token).await })
    };

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match rt.aggregator.fetch_signatures(chain_id).await {
                    Ok(responses) => {
                        let available = rt.aggregator.available_instruments(&responses);
                        rt.quotes.update_availability(chain_id, available).await;
                    }
                    Err(e) => warn!("Signature availability refresh failed: {}", e),
                }
                let snapshot = rt.quotes.instruments(chain_id).await;
                let open = snapshot.iter().filter(|i| i.open).count();
                info!("Chain {}: {} instruments, {} open", chain_id, snapshot.len(), open);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, stopping");
                handle.cancel();
                break;
            }
        }
    }

    refresher
        .await
        .map_err(|e| SynchroError::Internal(format!("refresh task failed: {}", e)))?;
    Ok(())
}
