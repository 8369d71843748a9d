//! Command-line front end for money-agent
//!
//! ```bash
//! export LLM_API_KEY=...
//! money-agent ask "分析一下600519"
//! money-agent chat
//! money-agent trades add 600519 buy 1700 100 --reason "回踩MA20"
//! money-agent trades list --code 600519
//! money-agent memory add principles "单只股票仓位不超过30%"
//! ```

use agent_llm::providers::{OpenAIConfig, OpenAIProvider};
use agent_memory::{Category, JsonFileMemoryStore, MemoryEntry, MemoryFilter, MemoryStore, Provenance};
use agent_runtime::RuntimeConfig;
use agent_stock::{
    Direction, JsonFileTradeLedger, SnapshotMarketData, StockAgent, StockConfig, Trade, TradeLedger,
    TradeStats,
};
use agent_utils::Config;
use agent_workflow::CancellationToken;
use anyhow::Context as _;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "money-agent", about = "A-share analysis assistant", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a single question
    Ask { message: String },
    /// Interactive conversation; Ctrl-C cancels the running request
    Chat,
    /// Manage the trade ledger
    Trades {
        #[command(subcommand)]
        action: TradesAction,
    },
    /// Manage shared memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand, Debug)]
enum TradesAction {
    /// Record a trade
    Add {
        code: String,
        /// buy or sell
        direction: String,
        price: f64,
        quantity: u32,
        /// Trade date (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// List recorded trades with review statistics
    List {
        #[arg(long)]
        code: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum MemoryAction {
    /// Add an entry (principles, patterns or cases)
    Add {
        category: String,
        content: String,
        #[arg(long)]
        stock: Option<String>,
    },
    /// List entries of a category
    List {
        category: String,
        #[arg(long)]
        stock: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

async fn build_agent(config: &Config) -> anyhow::Result<StockAgent> {
    let stock_config = StockConfig::default();

    let provider = OpenAIProvider::with_config(
        OpenAIConfig::new(config.require_api_key()?).with_api_base(&config.llm_api_base),
    )?;
    let market = SnapshotMarketData::from_json_file(config.market_file())
        .await
        .with_context(|| format!("loading {}", config.market_file().display()))?;
    let ledger = JsonFileTradeLedger::open(config.trades_file(), stock_config.duplicate_trade_window).await?;
    let memory = JsonFileMemoryStore::open(config.memory_file()).await?;

    let agent = StockAgent::builder()
        .provider(Arc::new(provider))
        .market(Arc::new(market))
        .ledger(Arc::new(ledger))
        .memory(Arc::new(memory))
        .runtime_config(RuntimeConfig::builder().model(&config.llm_model).build()?)
        .stock_config(stock_config)
        .build()?;
    Ok(agent)
}

async fn ask(config: &Config, message: &str) -> anyhow::Result<()> {
    let agent = build_agent(config).await?;
    let out = agent.run(message, &[]).await;
    println!("{}", out.final_message);
    Ok(())
}

async fn chat(config: &Config) -> anyhow::Result<()> {
    let agent = build_agent(config).await?;
    println!("money-agent 已就绪。输入问题开始对话，/exit 退出。\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history = Vec::new();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/exit" {
            break;
        }

        let cancel = CancellationToken::new();
        let out = {
            let run = agent.run_with_cancel(line, &history, &cancel);
            tokio::pin!(run);
            tokio::select! {
                out = &mut run => out,
                _ = tokio::signal::ctrl_c() => {
                    cancel.cancel();
                    run.await
                }
            }
        };
        println!("{}\n", out.final_message);
        history = out.messages;
    }
    println!("再见！");
    Ok(())
}

fn trades_table(trades: &[Trade]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(["#", "日期", "代码", "名称", "方向", "价格", "数量", "理由"]);
    for trade in trades {
        table.add_row([
            trade.id.map(|id| id.to_string()).unwrap_or_default(),
            trade.date.to_string(),
            trade.stock_code.clone(),
            trade.stock_name.clone(),
            trade.direction.label_zh().to_string(),
            format!("{:.2}", trade.price),
            trade.quantity.to_string(),
            trade.reason.clone(),
        ]);
    }
    table
}

async fn trades(config: &Config, action: TradesAction) -> anyhow::Result<()> {
    let ledger =
        JsonFileTradeLedger::open(config.trades_file(), StockConfig::default().duplicate_trade_window).await?;

    match action {
        TradesAction::Add {
            code,
            direction,
            price,
            quantity,
            date,
            reason,
        } => {
            let direction: Direction = direction.parse()?;
            let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            let mut trade = Trade::new(code, direction, price, quantity, date);
            if let Some(reason) = reason {
                trade = trade.with_reason(reason);
            }
            let id = ledger.record(trade).await?;
            println!("已保存交易记录 #{id}");
        }
        TradesAction::List { code } => {
            let trades = ledger.list(code).await?;
            if trades.is_empty() {
                println!("暂无交易记录");
                return Ok(());
            }
            println!("{}", trades_table(&trades));

            let stats = TradeStats::from_trades(&trades);
            println!(
                "已平仓 {} 笔，胜率 {:.1}%，盈亏比 {:.2}，已实现盈亏 {:.2}",
                stats.total,
                stats.win_rate * 100.0,
                stats.profit_ratio,
                stats.realized_pnl
            );
        }
    }
    Ok(())
}

async fn memory(config: &Config, action: MemoryAction) -> anyhow::Result<()> {
    let store = JsonFileMemoryStore::open(config.memory_file()).await?;

    match action {
        MemoryAction::Add {
            category,
            content,
            stock,
        } => {
            let mut entry = MemoryEntry::new(category.parse::<Category>()?, content, Provenance::UserInput);
            if let Some(code) = stock {
                entry = entry.for_stock(code);
            }
            let id = store.write(entry).await?;
            println!("已写入记忆 #{id}");
        }
        MemoryAction::List {
            category,
            stock,
            limit,
        } => {
            let mut filter = MemoryFilter::new().limit(limit);
            if let Some(code) = stock {
                filter = filter.stock(code);
            }
            let entries = store.read(category.parse::<Category>()?, &filter).await?;

            let mut table = Table::new();
            table.load_preset(UTF8_FULL).set_header(["#", "股票", "来源", "内容", "更新时间"]);
            for entry in entries {
                table.add_row([
                    entry.id.map(|id| id.to_string()).unwrap_or_default(),
                    entry.stock_code.unwrap_or_default(),
                    entry.source.as_str().to_string(),
                    entry.content,
                    entry.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    agent_utils::init_tracing_with(&config.log_filter, config.log_format);

    let cli = Cli::parse();
    info!(environment = %config.environment, data_dir = %config.data_dir.display(), "starting");

    match cli.command {
        Command::Ask { message } => ask(&config, &message).await,
        Command::Chat => chat(&config).await,
        Command::Trades { action } => trades(&config, action).await,
        Command::Memory { action } => memory(&config, action).await,
    }
}
