use dotenvy::dotenv;
use serde_json::json;
use std::env;

use pow_ledger::Chain;
use pow_ledger::blockchain::TARGET_BLOCK_TIME_SECS;

fn main() {
    let _ = dotenv();
    env_logger::init();

    let target_block_time: f64 = env::var("TARGET_BLOCK_TIME_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(TARGET_BLOCK_TIME_SECS);

    println!("⛓️ Building proof-of-work ledger (target block time: {target_block_time}s)");

    let mut chain = Chain::with_target_block_time(target_block_time);
    chain.append(Some(json!({"from": "John", "to": "Bob", "amount": 100})));
    chain.append(Some(json!({"from": "Bob", "to": "John", "amount": 50})));

    println!("{chain}");
    println!("chain valid: {}", chain.is_valid());
}
