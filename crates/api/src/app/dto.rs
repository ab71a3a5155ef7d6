use serde_json::{json, Value};

use wallets_core::{Movement, TransferReceipt, Wallet, WalletName};

pub fn wallet_to_json(wallet: &Wallet) -> Value {
    json!({
        "name": wallet.name.as_str(),
        "balance": wallet.balance,
    })
}

pub fn balance_to_json(name: &WalletName, balance: i64) -> Value {
    json!({
        "name": name.as_str(),
        "balance": balance,
    })
}

pub fn movement_to_json(movement: &Movement) -> Value {
    json!({
        "id": movement.id,
        "wallet": movement.wallet.as_str(),
        "direction": movement.direction.as_str(),
        "amount": movement.amount,
        "meta": movement.meta,
        "time": movement.created_at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
    })
}

pub fn transfer_to_json(receipt: &TransferReceipt) -> Value {
    json!({
        "debit": movement_to_json(&receipt.debit),
        "credit": movement_to_json(&receipt.credit),
    })
}
