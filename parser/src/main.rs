use std::io::BufRead;

use anyhow::{format_err, Result};
use log::debug;
use pricefeed_tx::{deserialize, PriceTx};
use serde_json::Value;

/// Decodes one hex encoded price transaction.
pub fn parse_tx(input: &str) -> Result<PriceTx> {
    let raw = hex::decode(input.trim())?;
    deserialize::<PriceTx>(&raw).map_err(|e| format_err!("invalid price transaction: {e}"))
}

pub fn describe(tx: &PriceTx) -> Result<Value> {
    Ok(serde_json::to_value(tx.summary())?)
}

fn process_line(line: &str) -> Result<()> {
    let tx = parse_tx(line)?;
    debug!("{tx}");
    println!("{}", describe(&tx)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let stdin = std::io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            if let Err(e) = process_line(&line) {
                eprintln!("Error processing line: {}", e);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_median() {
        let input = "170186682222222222222222222222222222222222222222030000804800028016010007";

        let tx = parse_tx(input).unwrap();
        let summary = describe(&tx).unwrap();
        assert_eq!(summary["type"], "BlockPriceMedian");
        assert_eq!(summary["validHeight"], 1000);
        assert_eq!(summary["fee"], 0);
        assert_eq!(
            summary["involvedKeyIds"][0],
            "2222222222222222222222222222222222222222"
        );
        assert_eq!(summary["prices"][0]["price"], 200);
        assert_eq!(summary["prices"][2]["coinType"], "GOVERNANCE");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_tx("zz").is_err());
        assert!(parse_tx("1801").is_err());
    }
}
