use candlefeed::{FacadeOptions, IteratorOptions, MarketFacade, MarketSource};
use candlefeed_core::model::{Interval, Provider};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::process::ExitCode;
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Thin front end: parse arguments, pull candles from the façade, print one
/// JSON object per line. Everything non-trivial (pagination, retries,
/// caching, gap-patching) lives in the `candlefeed` facade crate (§6).
#[derive(Parser, Debug)]
#[command(name = "candlefeed-cli")]
struct Args {
    /// Only `COIN` is accepted.
    #[arg(long = "market-type", alias = "marketType")]
    market_type: String,

    #[arg(long)]
    provider: String,

    #[arg(long = "base-asset", alias = "baseAsset")]
    base_asset: String,

    #[arg(long = "quote-asset", alias = "quoteAsset")]
    quote_asset: String,

    /// RFC3339 timestamp.
    #[arg(long = "start-time", alias = "startTime")]
    start_time: String,

    /// A duration string such as `1m`, `1h`, `1d`.
    #[arg(long = "candlestick-interval", alias = "candlestickInterval")]
    candlestick_interval: String,

    #[arg(long, default_value_t = 10)]
    limit: u64,
}

fn parse_interval(raw: &str) -> Result<Interval, String> {
    let (number, unit) = raw.split_at(
        raw.find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("no unit in interval {raw:?}"))?,
    );
    let n: i64 = number.parse().map_err(|_| format!("bad interval number in {raw:?}"))?;
    let secs = match unit {
        "s" => n,
        "m" => n * 60,
        "h" => n * 3600,
        "d" => n * 86400,
        "w" => n * 7 * 86400,
        "M" => n * 30 * 86400,
        other => return Err(format!("unrecognized interval unit {other:?}")),
    };
    Interval::from_secs(secs).map_err(|e| e.to_string())
}

async fn run(args: Args) -> Result<(), String> {
    if args.market_type != "COIN" {
        return Err(format!("unsupported -marketType {:?}, only COIN is accepted", args.market_type));
    }
    let provider = Provider::from_str(&args.provider).map_err(|e| e.to_string())?;
    let start: DateTime<Utc> = DateTime::parse_from_rfc3339(&args.start_time)
        .map_err(|e| format!("bad -startTime {:?}: {e}", args.start_time))?
        .with_timezone(&Utc);
    let interval = parse_interval(&args.candlestick_interval)?;

    let facade = MarketFacade::new(FacadeOptions::default());
    let market = MarketSource::new(provider, args.base_asset.as_str(), args.quote_asset.as_str());
    let mut iterator = facade
        .iterator(market, start, interval, IteratorOptions::default())
        .map_err(|e| e.to_string())?;

    for _ in 0..args.limit {
        match iterator.next().await {
            Ok(candle) => {
                let line = serde_json::to_string(&candle).expect("Candlestick serialization never fails");
                println!("{line}");
            }
            Err(e) => {
                error!(error = %e, "stopping mid-stream");
                return Ok(());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "candlefeed=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minute_hour_day_intervals() {
        assert_eq!(parse_interval("1m").unwrap(), Interval::ONE_MINUTE);
        assert_eq!(parse_interval("4h").unwrap(), Interval::FOUR_HOURS);
        assert_eq!(parse_interval("1d").unwrap(), Interval::ONE_DAY);
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_interval("1x").is_err());
    }
}
