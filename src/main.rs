use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use payg_core::application::payments::PaymentProcessor;
use payg_core::application::settlement::SettlementOrchestrator;
use payg_core::config::Settings;
use payg_core::domain::ports::SettlementStore;
use payg_core::infrastructure::in_memory::InMemoryStore;
use payg_core::infrastructure::notifier::TracingNotifier;
use payg_core::interfaces::csv::loan_writer::LoanWriter;
use payg_core::interfaces::csv::payment_reader::PaymentReader;
use payg_core::interfaces::seed::SeedData;
use payg_core::manufacturer::ManufacturerAdapters;
use payg_core::token::{self, Instruction, TokenRequest};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate one OpenPayGo activation code and print `token,next_counter`
    Token {
        /// Device secret, 32 lowercase hex characters
        #[arg(long)]
        secret: String,
        #[arg(long)]
        counter: u32,
        #[arg(long)]
        value: u32,
        #[arg(long, value_enum, default_value = "add-time")]
        instruction: InstructionArg,
        #[arg(long, default_value_t = 1)]
        divider: u32,
        #[arg(long)]
        restricted: bool,
        #[arg(long)]
        extended: bool,
        /// Use this starting code instead of deriving it from the counter
        #[arg(long)]
        starting_code: Option<String>,
    },
    /// Apply a CSV of manual payments to seeded loans and print the resulting loans
    Settle {
        /// Input payments CSV file
        input: PathBuf,

        /// JSON file with businesses, device types, agents, devices and loans
        #[arg(long)]
        seed: PathBuf,

        /// Path to persistent database (optional). If provided, uses RocksDB.
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InstructionArg {
    AddTime,
    SetTime,
    DisablePayg,
    CounterSync,
}

impl From<InstructionArg> for Instruction {
    fn from(arg: InstructionArg) -> Self {
        match arg {
            InstructionArg::AddTime => Instruction::AddTime,
            InstructionArg::SetTime => Instruction::SetTime,
            InstructionArg::DisablePayg => Instruction::DisablePayg,
            InstructionArg::CounterSync => Instruction::CounterSync,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Token {
            secret,
            counter,
            value,
            instruction,
            divider,
            restricted,
            extended,
            starting_code,
        } => {
            let mut request = TokenRequest::new(&secret, counter, value, instruction.into())
                .value_divider(divider);
            if restricted {
                request = request.restricted();
            }
            if extended {
                request = request.extended();
            }
            if let Some(code) = starting_code.as_deref() {
                request = request.starting_code(code);
            }
            let generated = token::generate(&request).into_diagnostic()?;
            println!("{},{}", generated.token, generated.next_counter);
        }
        Command::Settle {
            input,
            seed,
            db_path,
        } => settle(input, seed, db_path).await?,
    }
    Ok(())
}

async fn settle(input: PathBuf, seed: PathBuf, db_path: Option<PathBuf>) -> Result<()> {
    let store = open_store(db_path)?;

    let seed = SeedData::from_reader(File::open(seed).into_diagnostic()?).into_diagnostic()?;
    seed.load_into(store.as_ref()).await.into_diagnostic()?;

    let adapters = ManufacturerAdapters::from_settings(&Settings::from_env()).into_diagnostic()?;
    let processor = PaymentProcessor::new(
        Arc::clone(&store),
        SettlementOrchestrator::new(adapters),
        Arc::new(TracingNotifier),
    );

    // Process payments
    let file = File::open(input).into_diagnostic()?;
    let reader = PaymentReader::new(file);
    for payment in reader.payments() {
        match payment {
            Ok(payment) => {
                let reference = payment.transaction_id.clone();
                if let Err(e) = processor.record_manual_payment(payment).await {
                    eprintln!("Error processing payment {}: {}", reference, e);
                }
            }
            Err(e) => {
                eprintln!("Error reading payment: {}", e);
            }
        }
    }

    processor.flush_notices().await;

    // Output final state
    let loans = store.all_loans().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = LoanWriter::new(stdout.lock());
    writer.write_loans(loans).into_diagnostic()?;

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<Arc<dyn SettlementStore>> {
    use payg_core::infrastructure::rocksdb::RocksDBStore;

    let store: Arc<dyn SettlementStore> = match db_path {
        Some(path) => Arc::new(RocksDBStore::open(path).into_diagnostic()?),
        None => Arc::new(InMemoryStore::new()),
    };
    Ok(store)
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<Arc<dyn SettlementStore>> {
    if db_path.is_some() {
        miette::bail!("--db-path requires a build with the storage-rocksdb feature");
    }
    Ok(Arc::new(InMemoryStore::new()))
}
