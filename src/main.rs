use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use esbars::engine::MAX_ORDER_QTY;
use esbars::prelude::*;
use prettytable::{Cell, Row, Table};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "esbars")]
#[command(
    about = "Fetches futures bars from Databento and backtests a moving average crossover",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    //log level (eg info, debug), RUST_LOG overrides it
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    //fetch one bar range and cache it as raw dbn and cleaned csv
    Fetch(FetchArgs),

    //print vendor metadata, then run the default fetch
    Metadata(FetchArgs),

    //run the crossover backtest on previously fetched bars
    Backtest(BacktestArgs),
}

#[derive(Args)]
struct FetchArgs {
    //databento api key, defaults to DATABENTO_API_KEY
    #[arg(long)]
    api_key: Option<String>,

    //range start (eg 2024-01-01T00:00:00)
    #[arg(long)]
    start: Option<String>,

    //range end (eg 2024-12-31T23:59:59)
    #[arg(long)]
    end: Option<String>,

    //dataset (eg GLBX.MDP3)
    #[arg(long)]
    dataset: Option<String>,

    //comma separated symbols, the first names the output files
    #[arg(long, value_delimiter = ',')]
    symbols: Option<Vec<String>>,

    //symbology of the symbols (instrument_id, raw_symbol, continuous, parent)
    #[arg(long)]
    stype_in: Option<String>,

    //bar schema (ohlcv-1s, ohlcv-1m, ohlcv-1h, ohlcv-1d)
    #[arg(long)]
    schema: Option<String>,

    //contract kept in the cleaned csv (eg ESH4)
    #[arg(long)]
    filter_symbol: Option<String>,

    //directory for the raw and cleaned files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

impl FetchArgs {
    //applies the flags over the default request
    fn to_request(&self) -> Result<RangeRequest> {
        let mut request = RangeRequest::default();

        if let Some(start) = &self.start {
            request.start = start.clone();
        }
        if let Some(end) = &self.end {
            request.end = end.clone();
        }
        if let Some(dataset) = &self.dataset {
            request.dataset = dataset.clone();
        }
        if let Some(symbols) = &self.symbols {
            request.symbols = symbols.clone();
        }
        if let Some(stype_in) = &self.stype_in {
            request.stype_in = SType::parse(stype_in)
                .ok_or_else(|| anyhow::anyhow!("Unknown symbology type: {}", stype_in))?;
        }
        if let Some(schema) = &self.schema {
            request.schema = Schema::parse(schema)
                .ok_or_else(|| anyhow::anyhow!("Unsupported schema: {}", schema))?;
        }
        if let Some(filter_symbol) = &self.filter_symbol {
            request.filter_symbol = filter_symbol.clone();
        }

        Ok(request)
    }
}

#[derive(Args)]
struct BacktestArgs {
    //json configuration file, defaults are used when absent
    #[arg(long)]
    config: Option<PathBuf>,

    //bars to backtest (.dbn.zst from the fetch step, or csv)
    #[arg(long)]
    data: Option<PathBuf>,

    //fast moving average period
    #[arg(long)]
    fast: Option<usize>,

    //slow moving average period
    #[arg(long)]
    slow: Option<usize>,

    //number of contracts to trade
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_ORDER_QTY as i64))]
    trade_size: Option<u32>,

    //moving average kind (ema, sma)
    #[arg(long)]
    ma: Option<String>,

    //output path for equity curve csv
    #[arg(long)]
    output_equity_csv: Option<PathBuf>,

    //output path for fills csv
    #[arg(long)]
    output_fills_csv: Option<PathBuf>,

    //writes the effective configuration to this json file
    #[arg(long)]
    save_config: Option<PathBuf>,
}

impl BacktestArgs {
    fn to_configuration(&self) -> Result<BacktestConfiguration> {
        let mut config = match &self.config {
            Some(path) => BacktestConfiguration::from_json_file(path)
                .context(format!("Failed to load config from {:?}", path))?,
            None => BacktestConfiguration::default(),
        };

        if let Some(data) = &self.data {
            config.data_path = data.clone();
        }
        if let Some(fast) = self.fast {
            config.strategy.fast_period = fast;
        }
        if let Some(slow) = self.slow {
            config.strategy.slow_period = slow;
        }
        if let Some(trade_size) = self.trade_size {
            config.strategy.trade_size = trade_size;
        }
        if let Some(ma) = &self.ma {
            config.strategy.moving_average = MovingAverageKind::parse(ma)
                .ok_or_else(|| anyhow::anyhow!("Unknown moving average: {}", ma))?;
        }
        if self.output_equity_csv.is_some() {
            config.output_equity_csv = self.output_equity_csv.clone();
        }
        if self.output_fills_csv.is_some() {
            config.output_fills_csv = self.output_fills_csv.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    //a missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch(args) => {
            init_logging(cli.log_level.as_deref().unwrap_or("INFO"))?;
            run_fetch(&args)?;
        }
        Commands::Metadata(args) => {
            init_logging(cli.log_level.as_deref().unwrap_or("INFO"))?;
            run_metadata(&args)?;
        }
        Commands::Backtest(args) => {
            let config = args.to_configuration()?;
            init_logging(cli.log_level.as_deref().unwrap_or(&config.engine.log_level))?;

            if let Some(path) = &args.save_config {
                config
                    .to_json_file(path)
                    .context(format!("Failed to save config to {:?}", path))?;
                println!("Configuration saved to {:?}", path);
            }

            run_backtest(&config)?;
        }
    }

    Ok(())
}

fn run_fetch(args: &FetchArgs) -> Result<()> {
    let request = args.to_request()?;
    let client = DatabentoClient::new(args.api_key.clone())?;

    let records = fetch_and_store(&client, &request, &args.data_dir)
        .context(format!("Failed to fetch {}", request.primary_symbol()))?;

    println!("Raw data saved to {:?}", request.raw_path(&args.data_dir));
    println!("Cleaned data saved to {:?}", request.csv_path(&args.data_dir));
    println!("{} bars for {}\n", records.len(), request.filter_symbol);
    records_table(&records, 5).printstd();

    Ok(())
}

fn run_metadata(args: &FetchArgs) -> Result<()> {
    let request = args.to_request()?;
    let client = DatabentoClient::new(args.api_key.clone())?;

    let (metadata, records) = describe_and_fetch(&client, &request, &args.data_dir)
        .context(format!("Failed to fetch {}", request.primary_symbol()))?;

    println!("Datasets: {:?}", metadata.datasets);
    println!("Publishers: {:?}", metadata.publishers);
    println!("Schemas: {:?}", metadata.schemas);
    println!("Fields: {:?}", metadata.fields);
    println!("Count: {}", metadata.record_count);
    records_table(&records, 5).printstd();

    Ok(())
}

//the first n cleaned rows as a table
fn records_table(records: &[OhlcvRecord], n: usize) -> Table {
    let mut table = Table::new();
    table.add_row(Row::new(
        OhlcvRecord::COLUMNS.iter().map(|c| Cell::new(c)).collect(),
    ));

    for record in records.iter().take(n) {
        table.add_row(Row::new(vec![
            Cell::new(&record.timestamp.to_rfc3339()),
            Cell::new(&record.rtype.to_string()),
            Cell::new(&record.publisher_id.to_string()),
            Cell::new(&record.instrument_id.to_string()),
            Cell::new(&format!("{:.2}", record.open)),
            Cell::new(&format!("{:.2}", record.high)),
            Cell::new(&format!("{:.2}", record.low)),
            Cell::new(&format!("{:.2}", record.close)),
            Cell::new(&record.volume.to_string()),
            Cell::new(record.symbol.as_deref().unwrap_or("")),
        ]));
    }

    table
}

fn run_backtest(config: &BacktestConfiguration) -> Result<()> {
    let params = &config.strategy;

    println!(
        "Moving Average Crossover Strategy Backtest ({} {}/{})",
        params.moving_average.as_str(),
        params.fast_period,
        params.slow_period
    );
    println!("{}", "=".repeat(60));

    let mut engine = BacktestEngine::new(config.engine.to_engine_config());
    engine.add_venue(config.venue.clone())?;

    let contract = config
        .contract
        .to_futures_contract()
        .context("Invalid contract configuration")?;
    engine.add_instrument(contract.clone())?;

    //load data
    let bars = load_bars(&config.data_path, &contract.symbol)
        .context(format!("Failed to load data from {:?}", config.data_path))?;

    let (first, last) = match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => anyhow::bail!("No data found for symbol {}", contract.symbol),
    };

    println!("\nLoaded {} bars for {}", bars.len(), contract.symbol);
    println!("Date range: {} to {}", first, last);
    engine.add_data(bars)?;

    //create strategy
    let bar_type = params.resolve_bar_type(&contract)?;
    let strategy = CrossoverStrategy::new(
        bar_type.clone(),
        params.moving_average,
        params.fast_period,
        params.slow_period,
        params.trade_size,
    );
    engine.add_strategy(Box::new(strategy))?;

    println!("\nStrategy Configuration:");
    println!("Instrument: {}", contract.id());
    println!("Bar Type: {}", bar_type);
    println!("Fast MA Period: {}", params.fast_period);
    println!("Slow MA Period: {}", params.slow_period);
    println!("Trade Size: {}", params.trade_size);
    println!(
        "Starting Capital: ${:.2} {}",
        config.venue.starting_balance, config.venue.base_currency
    );

    //run backtest
    println!("\nRunning backtest...");
    let result = engine.run()?;

    //display results
    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS");
    println!("{}", "=".repeat(60));

    println!("\nAccount Report:");
    engine.generate_account_report().printstd();

    println!("\nOrder Fills Report:");
    engine.generate_order_fills_report().printstd();

    println!("\nPositions Report:");
    engine.generate_positions_report().printstd();

    println!("\nPerformance Summary:");
    result.summary.pretty_print_table();

    //save outputs if requested
    if let Some(equity_path) = &config.output_equity_csv {
        save_output(equity_path, |p| write_equity_csv(&result.equity_curve, p))?;
        println!("\nEquity curve saved to {:?}", equity_path);
    }

    if let Some(fills_path) = &config.output_fills_csv {
        save_output(fills_path, |p| write_fills_csv(&result.fills, p))?;
        println!("Fills saved to {:?}", fills_path);
    }

    println!("\nBacktest completed!");

    engine.reset();
    engine.dispose();

    Ok(())
}

fn save_output<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<(), csv::Error>,
{
    write(path).context(format!("Failed to write {:?}", path))
}
