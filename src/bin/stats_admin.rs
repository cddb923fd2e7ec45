//! 本地管理员命令行工具（直接操作 SQLite 存储，无需服务在线）：
//! - 维护客户参考表（新增 / 启用 / 停用 / 列表）
//! - 维护 IP 与 User-Agent 黑名单
//! - 查看某客户某日的小时统计

use std::env;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use customer_stats::config::AppConfig;
use customer_stats::features::counters::{HourBucketing, SqliteCounterStore};
use customer_stats::features::eligibility::SqliteEligibilityStore;
use customer_stats::features::stats::{CustomerDayStatistics, DayAggregator};
use customer_stats::startup::connect_sqlite;
use serde_json::json;

#[derive(Debug, Clone)]
struct Args {
    help: bool,
    json: bool,
    db: Option<String>,
    cmd: Option<Command>,
}

#[derive(Debug, Clone)]
enum Command {
    Help,
    CustomerAdd {
        id: i64,
        name: Option<String>,
        active: bool,
    },
    CustomerSetActive {
        id: i64,
        active: bool,
    },
    CustomerList,
    IpBlock(BlockAction),
    UaBlock(BlockAction),
    Day {
        customer_id: i64,
        day: i64,
    },
}

#[derive(Debug, Clone)]
enum BlockAction {
    Add(String),
    Remove(String),
    List,
}

#[derive(Debug)]
enum CliError {
    Args(String),
    Config(String),
    Store(String),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Args(msg) => write!(f, "参数错误: {msg}"),
            CliError::Config(msg) => write!(f, "配置错误: {msg}"),
            CliError::Store(msg) => write!(f, "存储错误: {msg}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<customer_stats::StoreError> for CliError {
    fn from(e: customer_stats::StoreError) -> Self {
        CliError::Store(e.to_string())
    }
}

impl From<customer_stats::AppError> for CliError {
    fn from(e: customer_stats::AppError) -> Self {
        CliError::Store(e.to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args = Args::parse(env::args().skip(1).collect())?;
    let Some(cmd) = args.cmd.clone() else {
        print_help();
        return Ok(());
    };
    if args.help || matches!(cmd, Command::Help) {
        print_help();
        return Ok(());
    }

    if let Err(err) = run(cmd, args.db, args.json).await {
        eprintln!("{err}");
        std::process::exit(2);
    }
    Ok(())
}

async fn run(cmd: Command, db: Option<String>, as_json: bool) -> Result<(), CliError> {
    let mut config = AppConfig::load().map_err(|e| CliError::Config(e.to_string()))?;
    if let Some(path) = db {
        config.store.sqlite_path = path;
    }
    let bucketing =
        HourBucketing::from_timezone_name(&config.buckets.timezone).map_err(CliError::Config)?;

    let pool = connect_sqlite(&config.store).await?;
    let eligibility = SqliteEligibilityStore::new(pool.clone());
    eligibility.init_schema().await?;
    let counters = SqliteCounterStore::new(pool.clone(), bucketing);
    counters.init_schema().await?;

    let outcome = match cmd {
        Command::Help => Ok(()),
        Command::CustomerAdd { id, name, active } => {
            eligibility
                .upsert_customer(id, name.as_deref(), active)
                .await?;
            print_result(as_json, json!({ "id": id, "active": active }), || {
                format!("customer {id} saved (active={active})")
            })
        }
        Command::CustomerSetActive { id, active } => {
            let changed = eligibility.set_customer_active(id, active).await?;
            if !changed {
                return Err(CliError::Args(format!("customer {id} 不存在")));
            }
            print_result(as_json, json!({ "id": id, "active": active }), || {
                format!("customer {id} active={active}")
            })
        }
        Command::CustomerList => {
            let rows = eligibility.list_customers().await?;
            if as_json {
                let items: Vec<_> = rows
                    .iter()
                    .map(|c| json!({ "id": c.id, "name": c.name, "active": c.active }))
                    .collect();
                print_json(&json!(items))
            } else {
                println!("id\tname\tactive");
                for c in rows {
                    println!("{}\t{}\t{}", c.id, c.name.as_deref().unwrap_or("-"), c.active);
                }
                Ok(())
            }
        }
        Command::IpBlock(action) => match action {
            BlockAction::Add(ip) => {
                let added = eligibility.add_blacklisted_ip(&ip).await?;
                print_result(as_json, json!({ "ip": ip, "changed": added }), || {
                    format!("ip {ip} blocked (new={added})")
                })
            }
            BlockAction::Remove(ip) => {
                let removed = eligibility.remove_blacklisted_ip(&ip).await?;
                print_result(as_json, json!({ "ip": ip, "changed": removed }), || {
                    format!("ip {ip} unblocked (existed={removed})")
                })
            }
            BlockAction::List => {
                let items = eligibility.list_blacklisted_ips().await?;
                print_list(as_json, &items)
            }
        },
        Command::UaBlock(action) => match action {
            BlockAction::Add(ua) => {
                let added = eligibility.add_blacklisted_user_agent(&ua).await?;
                print_result(as_json, json!({ "userAgent": ua, "changed": added }), || {
                    format!("user-agent {ua:?} blocked (new={added})")
                })
            }
            BlockAction::Remove(ua) => {
                let removed = eligibility.remove_blacklisted_user_agent(&ua).await?;
                print_result(as_json, json!({ "userAgent": ua, "changed": removed }), || {
                    format!("user-agent {ua:?} unblocked (existed={removed})")
                })
            }
            BlockAction::List => {
                let items = eligibility.list_blacklisted_user_agents().await?;
                print_list(as_json, &items)
            }
        },
        Command::Day { customer_id, day } => {
            let aggregator = DayAggregator::new(
                Arc::new(eligibility.clone()),
                Arc::new(counters),
                bucketing,
            );
            let summary = aggregator.get_day_statistics(customer_id, day).await?;
            if as_json {
                let doc: CustomerDayStatistics = summary.into();
                print_json(&json!(doc))
            } else {
                println!(
                    "customer={} day=[{}, {}) tz={} total={}",
                    summary.customer_id,
                    summary.day.start,
                    summary.day.end,
                    bucketing.timezone(),
                    summary.total_requests
                );
                println!("hour_start\tvalid\tinvalid");
                for b in &summary.hour_buckets {
                    println!("{}\t{}\t{}", b.hour_start, b.valid_count, b.invalid_count);
                }
                Ok(())
            }
        }
    };

    pool.close().await;
    outcome
}

impl Args {
    fn parse(argv: Vec<String>) -> Result<Self, CliError> {
        let mut help = false;
        let mut json = false;
        let mut db = None;

        let mut idx = 0usize;
        while idx < argv.len() {
            match argv[idx].as_str() {
                "-h" | "--help" => {
                    help = true;
                    idx += 1;
                }
                "--json" => {
                    json = true;
                    idx += 1;
                }
                "--db" => {
                    idx += 1;
                    db = Some(
                        argv.get(idx)
                            .ok_or_else(|| CliError::Args("缺少 --db 的值".to_string()))?
                            .to_string(),
                    );
                    idx += 1;
                }
                _ => break,
            }
        }

        let cmd = if idx >= argv.len() {
            None
        } else {
            Some(parse_command(&argv[idx], &argv[(idx + 1)..])?)
        };

        Ok(Self {
            help,
            json,
            db,
            cmd,
        })
    }
}

fn parse_command(name: &str, rest: &[String]) -> Result<Command, CliError> {
    match name {
        "customer" => parse_customer_cmd(rest),
        "ip-block" => parse_block_action(rest, "ip-block").map(Command::IpBlock),
        "ua-block" => parse_block_action(rest, "ua-block").map(Command::UaBlock),
        "day" => parse_day_cmd(rest),
        "help" => Ok(Command::Help),
        _ => Err(CliError::Args(format!("未知命令: {name}"))),
    }
}

fn parse_customer_cmd(rest: &[String]) -> Result<Command, CliError> {
    let sub = rest
        .first()
        .ok_or_else(|| CliError::Args("customer 需要子命令: add|activate|deactivate|list".into()))?;
    let rest = &rest[1..];

    match sub.as_str() {
        "list" => Ok(Command::CustomerList),
        "activate" | "deactivate" => {
            let id = parse_id_flag(rest, "--id")?;
            Ok(Command::CustomerSetActive {
                id,
                active: sub == "activate",
            })
        }
        "add" => {
            let mut id = None;
            let mut name = None;
            let mut active = true;

            let mut idx = 0usize;
            while idx < rest.len() {
                match rest[idx].as_str() {
                    "--id" => {
                        idx += 1;
                        id = Some(parse_i64(
                            rest.get(idx)
                                .ok_or_else(|| CliError::Args("缺少 --id 的值".to_string()))?,
                            "--id",
                        )?);
                        idx += 1;
                    }
                    "--name" => {
                        idx += 1;
                        name = Some(
                            rest.get(idx)
                                .ok_or_else(|| CliError::Args("缺少 --name 的值".to_string()))?
                                .to_string(),
                        );
                        idx += 1;
                    }
                    "--inactive" => {
                        active = false;
                        idx += 1;
                    }
                    unknown => {
                        return Err(CliError::Args(format!("customer add 不支持参数: {unknown}")));
                    }
                }
            }

            let id = id.ok_or_else(|| CliError::Args("缺少 --id".to_string()))?;
            Ok(Command::CustomerAdd { id, name, active })
        }
        other => Err(CliError::Args(format!("customer 未知子命令: {other}"))),
    }
}

fn parse_block_action(rest: &[String], cmd_name: &str) -> Result<BlockAction, CliError> {
    let sub = rest
        .first()
        .ok_or_else(|| CliError::Args(format!("{cmd_name} 需要子命令: add|remove|list")))?;
    let value = || {
        rest.get(1)
            .map(|v| v.to_string())
            .ok_or_else(|| CliError::Args(format!("{cmd_name} {sub} 缺少取值")))
    };

    match sub.as_str() {
        "add" => value().map(BlockAction::Add),
        "remove" => value().map(BlockAction::Remove),
        "list" => Ok(BlockAction::List),
        other => Err(CliError::Args(format!("{cmd_name} 未知子命令: {other}"))),
    }
}

fn parse_day_cmd(rest: &[String]) -> Result<Command, CliError> {
    let customer_id = parse_id_flag(rest, "--customer")?;
    let day = parse_id_flag(rest, "--day")?;
    Ok(Command::Day { customer_id, day })
}

/// 在参数中查找 `flag VALUE` 并解析为整数
fn parse_id_flag(rest: &[String], flag: &str) -> Result<i64, CliError> {
    let pos = rest
        .iter()
        .position(|a| a == flag)
        .ok_or_else(|| CliError::Args(format!("缺少 {flag}")))?;
    let raw = rest
        .get(pos + 1)
        .ok_or_else(|| CliError::Args(format!("缺少 {flag} 的值")))?;
    parse_i64(raw, flag)
}

fn parse_i64(raw: &str, flag: &str) -> Result<i64, CliError> {
    raw.parse::<i64>()
        .map_err(|_| CliError::Args(format!("{flag} 需要整数，收到: {raw}")))
}

fn print_json(v: &serde_json::Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(v)
        .map_err(|e| CliError::Config(format!("JSON 序列化失败: {e}")))?;
    println!("{text}");
    Ok(())
}

fn print_result(
    as_json: bool,
    doc: serde_json::Value,
    text: impl FnOnce() -> String,
) -> Result<(), CliError> {
    if as_json {
        print_json(&doc)
    } else {
        println!("{}", text());
        Ok(())
    }
}

fn print_list(as_json: bool, items: &[String]) -> Result<(), CliError> {
    if as_json {
        return print_json(&json!(items));
    }
    for x in items {
        println!("{x}");
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"stats_admin（本地管理工具，直接读写 SQLite）

全局参数：
  --db PATH                 SQLite 文件路径（默认取 config.toml 的 store.sqlite_path）
  --json                    JSON 输出（便于脚本集成）
  -h, --help                显示帮助

命令：
  customer add --id N [--name NAME] [--inactive]
  customer activate --id N
  customer deactivate --id N
  customer list

  ip-block add IP | remove IP | list
  ua-block add UA | remove UA | list

  day --customer N --day EPOCH_SECS
    输出参考时区内该日的逐小时有效/无效计数与总数
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_global_flags_before_command() {
        let args = Args::parse(argv(&["--json", "--db", "/tmp/x.db", "customer", "list"])).unwrap();
        assert!(args.json);
        assert_eq!(args.db.as_deref(), Some("/tmp/x.db"));
        assert!(matches!(args.cmd, Some(Command::CustomerList)));
    }

    #[test]
    fn parses_customer_add() {
        let args = Args::parse(argv(&[
            "customer", "add", "--id", "7", "--name", "acme", "--inactive",
        ]))
        .unwrap();
        match args.cmd {
            Some(Command::CustomerAdd { id, name, active }) => {
                assert_eq!(id, 7);
                assert_eq!(name.as_deref(), Some("acme"));
                assert!(!active);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn block_commands_require_value() {
        assert!(Args::parse(argv(&["ip-block", "add"])).is_err());
        let args = Args::parse(argv(&["ua-block", "add", "Googlebot-News"])).unwrap();
        assert!(matches!(
            args.cmd,
            Some(Command::UaBlock(BlockAction::Add(ref ua))) if ua == "Googlebot-News"
        ));
    }

    #[test]
    fn day_requires_integer_flags() {
        assert!(Args::parse(argv(&["day", "--customer", "x", "--day", "1"])).is_err());
        let args = Args::parse(argv(&["day", "--customer", "1", "--day", "1500000000"])).unwrap();
        assert!(matches!(
            args.cmd,
            Some(Command::Day {
                customer_id: 1,
                day: 1_500_000_000
            })
        ));
    }
}
