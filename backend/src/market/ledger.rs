//! 钱包与流水
//!
//! 每一次余额变动都会追加一条 Transaction（带变动后的余额）。
//! `invest_from_escrow` 只是托管资金改记为在投本金，余额不变，不记流水。

use super::adapter::{Clock, StorageAdapter};
use super::{Marketplace, keys, require_self_or_admin};
use crate::error::{MarketError, MarketResult};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tripfin_shared::protocol::{ListTransactionsRequest, TransactionStats};
use tripfin_shared::{Transaction, TransactionCategory, TransactionType, User, Wallet};

/// 一次余额变动的描述
struct Movement<'a> {
    op: &'static str,
    kind: TransactionType,
    category: TransactionCategory,
    amount: Decimal,
    description: &'a str,
}

fn ensure_positive(amount: Decimal, op: &'static str) -> MarketResult<()> {
    if amount <= Decimal::ZERO {
        return Err(MarketError::invalid_input("Amount must be greater than zero").in_op(op));
    }
    Ok(())
}

fn category_name(category: TransactionCategory) -> String {
    match serde_json::to_value(category) {
        Ok(serde_json::Value::String(s)) => s,
        _ => format!("{:?}", category).to_lowercase(),
    }
}

impl<S, C> Marketplace<S, C>
where
    S: StorageAdapter,
    C: Clock,
{
    // =========================================================
    // 钱包读写
    // =========================================================

    /// 钱包不存在时自动创建一个空钱包
    pub async fn wallet(&self, user_id: &str) -> MarketResult<Wallet> {
        let key = keys::wallet(user_id);
        match self.storage.get::<Wallet>(&key).await? {
            Some(w) => Ok(w),
            None => {
                let wallet = Wallet::empty(user_id);
                self.storage.put(&key, &wallet).await?;
                Ok(wallet)
            }
        }
    }

    async fn save_wallet(&self, wallet: &Wallet) -> MarketResult<()> {
        self.storage.put(&keys::wallet(&wallet.user_id), wallet).await
    }

    /// 读取钱包、执行变动、写回并记流水
    async fn apply<F>(&self, user_id: &str, movement: Movement<'_>, mutate: F) -> MarketResult<Wallet>
    where
        F: FnOnce(&mut Wallet) -> MarketResult<()>,
    {
        ensure_positive(movement.amount, movement.op)?;
        let mut wallet = self.wallet(user_id).await?;
        mutate(&mut wallet).map_err(|e| e.in_op_with(movement.op, user_id))?;
        self.save_wallet(&wallet).await?;

        let seq = self.next_seq("txn").await?;
        let txn = Transaction {
            id: Self::new_id(),
            user_id: user_id.to_string(),
            kind: movement.kind,
            amount: movement.amount,
            category: movement.category,
            description: movement.description.to_string(),
            balance_after: wallet.balance,
            timestamp: self.now(),
        };
        self.storage
            .put(&keys::transaction(user_id, seq), &txn)
            .await?;

        log_info!(
            "[ledger] {} user={} amount={} balance={}",
            movement.op,
            user_id,
            movement.amount,
            wallet.balance
        );
        Ok(wallet)
    }

    // =========================================================
    // 资金操作
    // =========================================================

    pub async fn deposit(&self, user_id: &str, amount: Decimal, description: &str) -> MarketResult<Wallet> {
        let movement = Movement {
            op: "ledger.deposit",
            kind: TransactionType::Credit,
            category: TransactionCategory::Deposit,
            amount,
            description,
        };
        self.apply(user_id, movement, |w| {
            w.balance += amount;
            Ok(())
        })
        .await
    }

    pub async fn withdraw(&self, user_id: &str, amount: Decimal, description: &str) -> MarketResult<Wallet> {
        let movement = Movement {
            op: "ledger.withdraw",
            kind: TransactionType::Debit,
            category: TransactionCategory::Withdrawal,
            amount,
            description,
        };
        self.apply(user_id, movement, |w| {
            if w.balance < amount {
                return Err(MarketError::insufficient_funds(
                    "Insufficient balance",
                    amount,
                    w.balance,
                ));
            }
            w.balance -= amount;
            Ok(())
        })
        .await
    }

    /// 出价：余额转入托管
    pub async fn escrow(&self, user_id: &str, amount: Decimal, description: &str) -> MarketResult<Wallet> {
        let movement = Movement {
            op: "ledger.escrow",
            kind: TransactionType::Debit,
            category: TransactionCategory::Investment,
            amount,
            description,
        };
        self.apply(user_id, movement, |w| {
            if w.balance < amount {
                return Err(MarketError::insufficient_funds(
                    "Insufficient balance",
                    amount,
                    w.balance,
                ));
            }
            w.balance -= amount;
            w.escrowed_amount += amount;
            Ok(())
        })
        .await
    }

    /// 中标：托管资金转为在投本金
    pub async fn invest_from_escrow(&self, user_id: &str, amount: Decimal) -> MarketResult<Wallet> {
        ensure_positive(amount, "ledger.invest")?;
        let mut wallet = self.wallet(user_id).await?;
        if wallet.escrowed_amount < amount {
            return Err(MarketError::invalid_input("Insufficient escrowed amount")
                .in_op_with("ledger.invest", user_id));
        }
        wallet.escrowed_amount -= amount;
        wallet.total_invested += amount;
        self.save_wallet(&wallet).await?;
        log_info!("[ledger] ledger.invest user={} amount={}", user_id, amount);
        Ok(wallet)
    }

    /// 未中标或行程取消：托管资金退回余额
    pub async fn release_escrow(&self, user_id: &str, amount: Decimal, description: &str) -> MarketResult<Wallet> {
        let movement = Movement {
            op: "ledger.refund",
            kind: TransactionType::Credit,
            category: TransactionCategory::Refund,
            amount,
            description,
        };
        self.apply(user_id, movement, |w| {
            if w.escrowed_amount < amount {
                return Err(MarketError::invalid_input("Insufficient escrowed amount"));
            }
            w.escrowed_amount -= amount;
            w.balance += amount;
            Ok(())
        })
        .await
    }

    /// 还款到账：本金 + 利息
    pub async fn credit_return(
        &self,
        user_id: &str,
        principal: Decimal,
        interest: Decimal,
        description: &str,
    ) -> MarketResult<Wallet> {
        let total = principal + interest;
        let movement = Movement {
            op: "ledger.return",
            kind: TransactionType::Credit,
            category: TransactionCategory::Return,
            amount: total,
            description,
        };
        self.apply(user_id, movement, |w| {
            w.balance += total;
            w.total_invested = (w.total_invested - principal).max(Decimal::ZERO);
            w.total_returns += interest;
            Ok(())
        })
        .await
    }

    pub async fn debit(
        &self,
        user_id: &str,
        amount: Decimal,
        category: TransactionCategory,
        description: &str,
    ) -> MarketResult<Wallet> {
        let movement = Movement {
            op: "ledger.debit",
            kind: TransactionType::Debit,
            category,
            amount,
            description,
        };
        self.apply(user_id, movement, |w| {
            if w.balance < amount {
                return Err(MarketError::insufficient_funds(
                    "Insufficient balance",
                    amount,
                    w.balance,
                ));
            }
            w.balance -= amount;
            Ok(())
        })
        .await
    }

    pub async fn credit(
        &self,
        user_id: &str,
        amount: Decimal,
        category: TransactionCategory,
        description: &str,
    ) -> MarketResult<Wallet> {
        let movement = Movement {
            op: "ledger.credit",
            kind: TransactionType::Credit,
            category,
            amount,
            description,
        };
        self.apply(user_id, movement, |w| {
            w.balance += amount;
            Ok(())
        })
        .await
    }

    // =========================================================
    // 流水查询
    // =========================================================

    /// 最新的在前
    pub async fn transactions(&self, user_id: &str, limit: Option<usize>) -> MarketResult<Vec<Transaction>> {
        let mut list: Vec<Transaction> = self
            .storage
            .list(&keys::transactions(user_id))
            .await?
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        list.reverse();
        if let Some(limit) = limit {
            list.truncate(limit);
        }
        Ok(list)
    }

    pub async fn transaction_stats(&self, user_id: &str) -> MarketResult<TransactionStats> {
        let list = self.transactions(user_id, None).await?;
        let mut stats = TransactionStats {
            count: list.len(),
            ..Default::default()
        };
        let mut by_category: BTreeMap<String, Decimal> = BTreeMap::new();
        for txn in &list {
            match txn.kind {
                TransactionType::Credit => stats.total_credits += txn.amount,
                TransactionType::Debit => stats.total_debits += txn.amount,
            }
            *by_category.entry(category_name(txn.category)).or_default() += txn.amount;
        }
        stats.by_category = by_category;
        Ok(stats)
    }

    // =========================================================
    // REST 入口 (带权限)
    // =========================================================

    pub async fn get_wallet(&self, actor: &User, user_id: &str) -> MarketResult<Wallet> {
        require_self_or_admin(actor, user_id)?;
        self.wallet(user_id).await
    }

    pub async fn add_money(&self, actor: &User, user_id: &str, amount: Decimal) -> MarketResult<Wallet> {
        if actor.id != user_id {
            return Err(MarketError::forbidden("Cannot add money to another user's wallet"));
        }
        self.deposit(user_id, amount, "Added money to wallet").await
    }

    pub async fn withdraw_money(&self, actor: &User, user_id: &str, amount: Decimal) -> MarketResult<Wallet> {
        if actor.id != user_id {
            return Err(MarketError::forbidden("Cannot withdraw from another user's wallet"));
        }
        self.withdraw(user_id, amount, "Withdrawal to bank account").await
    }

    pub async fn list_transactions(
        &self,
        actor: &User,
        user_id: &str,
        req: ListTransactionsRequest,
    ) -> MarketResult<Vec<Transaction>> {
        require_self_or_admin(actor, user_id)?;
        self.transactions(user_id, req.limit).await
    }

    pub async fn user_transaction_stats(&self, actor: &User, user_id: &str) -> MarketResult<TransactionStats> {
        require_self_or_admin(actor, user_id)?;
        self.transaction_stats(user_id).await
    }
}

#[cfg(test)]
mod tests;
