use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use futures_bot::{
    commands,
    core::{
        config::{ApiKeys, BotConfig, DEFAULT_LOG_FILE},
        error::ExchangeError,
        types::OrderSide,
    },
    exchanges::BinanceFuturesClient,
    strategies::TwapPlan,
    utils::init_logger,
};
use tokio::sync::watch;

fn side_arg() -> Arg {
    Arg::new("side")
        .help("订单方向: BUY / SELL")
        .required(true)
        .value_parser(["BUY", "SELL"])
        .ignore_case(true)
}

fn cli() -> Command {
    Command::new("futures-bot")
        .version("0.1.0")
        .about("Binance Futures 下单工具（市价、限价、TWAP）")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("YAML配置文件路径")
                .global(true),
        )
        .arg(
            Arg::new("log_level")
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别: error, warn, info, debug, trace")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .ignore_case(true)
                .default_value("info")
                .global(true),
        )
        .arg(
            Arg::new("sync_time")
                .long("sync-time")
                .help("下单前同步服务器时间")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("market")
                .about("市价单, 例: market BTCUSDT BUY 0.001")
                .arg(Arg::new("symbol").help("交易对 (如 BTCUSDT)").required(true))
                .arg(side_arg())
                .arg(
                    Arg::new("quantity")
                        .help("数量")
                        .required(true)
                        .value_parser(value_parser!(f64)),
                ),
        )
        .subcommand(
            Command::new("limit")
                .about("限价单 (GTC), 例: limit BTCUSDT SELL 0.002 50000")
                .arg(Arg::new("symbol").help("交易对").required(true))
                .arg(side_arg())
                .arg(
                    Arg::new("quantity")
                        .help("数量")
                        .required(true)
                        .value_parser(value_parser!(f64)),
                )
                .arg(
                    Arg::new("price")
                        .help("限价")
                        .required(true)
                        .value_parser(value_parser!(f64)),
                ),
        )
        .subcommand(
            Command::new("twap")
                .about("TWAP拆单, 例: twap ETHUSDT BUY 0.005 1 5")
                .arg(Arg::new("symbol").help("交易对").required(true))
                .arg(side_arg())
                .arg(
                    Arg::new("quantity")
                        .help("总数量")
                        .required(true)
                        .value_parser(value_parser!(f64)),
                )
                .arg(
                    Arg::new("duration")
                        .help("持续时间（分钟）")
                        .required(true)
                        .value_parser(value_parser!(f64)),
                )
                .arg(
                    Arg::new("slices")
                        .help("分片数")
                        .required(true)
                        .value_parser(value_parser!(u32).range(1..)),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("查询订单状态, 例: status BTCUSDT 123456")
                .arg(Arg::new("symbol").help("交易对").required(true))
                .arg(
                    Arg::new("order_id")
                        .help("订单ID")
                        .required(true)
                        .value_parser(value_parser!(i64)),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> Result<BotConfig, ExchangeError> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => BotConfig::from_file(path)?,
        None => BotConfig::default(),
    };
    config.apply_env_overrides();
    if matches.get_flag("sync_time") {
        config.sync_time = true;
    }
    config.validate()?;
    Ok(config)
}

fn symbol_and_side(args: &ArgMatches) -> Result<(String, OrderSide), Box<dyn std::error::Error>> {
    let symbol = args
        .get_one::<String>("symbol")
        .ok_or("缺少参数 symbol")?
        .clone();
    let side: OrderSide = args.get_one::<String>("side").ok_or("缺少参数 side")?.parse()?;
    Ok((symbol, side))
}

fn required<T: Clone + Send + Sync + 'static>(
    args: &ArgMatches,
    name: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    args.get_one::<T>(name)
        .cloned()
        .ok_or_else(|| format!("缺少参数 {}", name).into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载环境变量
    dotenv::dotenv().ok();

    let matches = cli().get_matches();
    let log_level = matches
        .get_one::<String>("log_level")
        .map(String::as_str)
        .unwrap_or("info");

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            // 配置不可用时退回默认日志文件，保证错误能落盘
            if let Err(log_err) = init_logger(DEFAULT_LOG_FILE, log_level) {
                eprintln!("日志初始化失败: {}", log_err);
            }
            log::error!("加载配置失败: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = init_logger(&config.log_file, log_level) {
        eprintln!("日志初始化失败 ({}): {}", config.log_file, e);
        return Err(e.into());
    }

    let api_keys = match ApiKeys::from_env() {
        Ok(keys) => keys,
        Err(e) => {
            log::error!("API Keys not found: {}", e);
            return Err(e.into());
        }
    };

    let client = BinanceFuturesClient::new(&config, api_keys)?;
    if config.sync_time {
        // 同步失败时继续使用本地时间
        if let Err(e) = client.sync_server_time().await {
            log::warn!("同步服务器时间失败，使用本地时间: {}", e);
        }
    }

    match matches.subcommand() {
        Some(("market", args)) => {
            let (symbol, side) = symbol_and_side(args)?;
            let quantity: f64 = required(args, "quantity")?;
            commands::execute_market_order(&client, &symbol, side, quantity).await?;
        }
        Some(("limit", args)) => {
            let (symbol, side) = symbol_and_side(args)?;
            let quantity: f64 = required(args, "quantity")?;
            let price: f64 = required(args, "price")?;
            commands::execute_limit_order(&client, &symbol, side, quantity, price).await?;
        }
        Some(("twap", args)) => {
            let (symbol, side) = symbol_and_side(args)?;
            let quantity: f64 = required(args, "quantity")?;
            let duration: f64 = required(args, "duration")?;
            let slices: u32 = required(args, "slices")?;

            let plan = match TwapPlan::new(&symbol, side, quantity, duration, slices) {
                Ok(plan) => plan,
                Err(e) => {
                    log::error!("TWAP参数错误: {}", e);
                    return Err(e.into());
                }
            };

            // Ctrl-C 打断分片间的等待，正在发送的请求会完成
            let (stop_tx, stop_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("收到停止信号，TWAP将在当前分片后停止...");
                    let _ = stop_tx.send(true);
                }
            });

            let report = commands::execute_twap_order(&client, plan, stop_rx).await;
            if report.succeeded() == 0 {
                return Err("TWAP没有任何分片成功".into());
            }
        }
        Some(("status", args)) => {
            let symbol: String = required(args, "symbol")?;
            let order_id: i64 = required(args, "order_id")?;
            commands::execute_order_status(&client, &symbol, order_id).await?;
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}
