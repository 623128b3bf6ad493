use super::{RecordQuery, RecordStore};
use crate::core::profile::{Category, CategoryGroup, ConnectedAccount, Subscription};
use crate::core::records::{FinancialRecord, Liquidity, MonetaryAmount, RecordKind};
use crate::core::window::DATE_FORMAT;
use anyhow::{Context, Result, anyhow};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

/// Column layout of one record table. Columns a table lacks are selected as NULL.
struct TableLayout {
    table: &'static str,
    category: &'static str,
    counterparty: &'static str,
    liquidity: &'static str,
    payment: &'static str,
}

fn layout(kind: RecordKind) -> TableLayout {
    match kind {
        RecordKind::Income => TableLayout {
            table: "income",
            category: "category",
            counterparty: "sender",
            liquidity: "NULL",
            payment: "NULL",
        },
        RecordKind::Expense => TableLayout {
            table: "expense",
            category: "category",
            counterparty: "sent_to",
            liquidity: "NULL",
            payment: "NULL",
        },
        RecordKind::WealthFund => TableLayout {
            table: "wealth_fund",
            category: "category_id",
            counterparty: "NULL",
            liquidity: "liquidity",
            payment: "NULL",
        },
        RecordKind::Loan => TableLayout {
            table: "loans",
            category: "category",
            counterparty: "lender",
            liquidity: "NULL",
            payment: "payment",
        },
        RecordKind::Investment => TableLayout {
            table: "investments",
            category: "category",
            counterparty: "broker",
            liquidity: "NULL",
            payment: "NULL",
        },
    }
}

fn category_table(group: CategoryGroup) -> &'static str {
    match group {
        CategoryGroup::Income => "income_categories",
        CategoryGroup::Expense => "expense_categories",
        CategoryGroup::Investment => "investment_categories",
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS income (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    amount REAL NOT NULL,
    date TEXT NOT NULL,
    planned INTEGER NOT NULL DEFAULT 0,
    category INTEGER,
    sender TEXT,
    connected_account TEXT,
    currency_code TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS expense (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    amount REAL NOT NULL,
    date TEXT NOT NULL,
    planned INTEGER NOT NULL DEFAULT 0,
    category INTEGER,
    sent_to TEXT,
    connected_account TEXT,
    currency_code TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS wealth_fund (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    amount REAL NOT NULL,
    date TEXT NOT NULL,
    planned INTEGER NOT NULL DEFAULT 0,
    category_id INTEGER,
    connected_account TEXT,
    currency_code TEXT NOT NULL DEFAULT '',
    liquidity TEXT
);
CREATE TABLE IF NOT EXISTS loans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    amount REAL NOT NULL,
    payment REAL,
    date TEXT NOT NULL,
    planned INTEGER NOT NULL DEFAULT 0,
    category INTEGER,
    lender TEXT,
    connected_account TEXT,
    currency_code TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS investments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    amount REAL NOT NULL,
    date TEXT NOT NULL,
    planned INTEGER NOT NULL DEFAULT 0,
    category INTEGER,
    broker TEXT,
    connected_account TEXT,
    currency_code TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    start_date TEXT,
    end_date TEXT,
    is_active INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS connected_accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    bank_id TEXT NOT NULL,
    account_number TEXT NOT NULL,
    account_type TEXT NOT NULL,
    name TEXT NOT NULL,
    currency TEXT NOT NULL,
    state TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS income_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    icon TEXT NOT NULL DEFAULT '',
    is_fixed INTEGER NOT NULL DEFAULT 0,
    user_id TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS expense_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    icon TEXT NOT NULL DEFAULT '',
    is_fixed INTEGER NOT NULL DEFAULT 0,
    user_id TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS investment_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    icon TEXT NOT NULL DEFAULT '',
    is_fixed INTEGER NOT NULL DEFAULT 0,
    user_id TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_income_user_date ON income(user_id, date);
CREATE INDEX IF NOT EXISTS idx_expense_user_date ON expense(user_id, date);
CREATE INDEX IF NOT EXISTS idx_wealth_fund_user_date ON wealth_fund(user_id, date);
CREATE INDEX IF NOT EXISTS idx_loans_user_date ON loans(user_id, date);
CREATE INDEX IF NOT EXISTS idx_investments_user_date ON investments(user_id, date);
";

/// Records kept in a SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self::from_connection(Connection::open_in_memory()?);
        store.ensure_tables()?;
        Ok(store)
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteStore {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection is unusable after a panic"))
    }

    /// Creates any missing table. Existing tables are left as they are.
    pub fn ensure_tables(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)
            .context("Failed to create record tables")?;
        Ok(())
    }

    pub fn insert_record(&self, record: &FinancialRecord) -> Result<i64> {
        let l = layout(record.kind);
        let mut columns = vec![
            "user_id",
            "amount",
            "date",
            "planned",
            l.category,
            "connected_account",
            "currency_code",
        ];
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(record.user_id.clone()),
            Box::new(record.amount.value),
            Box::new(record.date.format(DATE_FORMAT).to_string()),
            Box::new(record.planned),
            Box::new(record.category),
            Box::new(record.account.clone()),
            Box::new(record.amount.currency.clone()),
        ];
        if l.counterparty != "NULL" {
            columns.push(l.counterparty);
            values.push(Box::new(record.counterparty.clone()));
        }
        if l.liquidity != "NULL" {
            columns.push(l.liquidity);
            values.push(Box::new(record.liquidity.map(|v| v.to_string())));
        }
        if l.payment != "NULL" {
            columns.push(l.payment);
            values.push(Box::new(record.payment));
        }

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            l.table,
            columns.join(", "),
            placeholders.join(", ")
        );

        let conn = self.conn()?;
        conn.execute(&sql, rusqlite::params_from_iter(values.iter()))
            .with_context(|| format!("Failed to insert {} record", record.kind))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_subscription(&self, subscription: &Subscription) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO subscriptions (user_id, start_date, end_date, is_active) VALUES (?1, ?2, ?3, ?4)",
            params![
                subscription.user_id,
                subscription.start_date,
                subscription.end_date,
                subscription.is_active
            ],
        )?;
        Ok(())
    }

    pub fn insert_connected_account(&self, account: &ConnectedAccount) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO connected_accounts (user_id, bank_id, account_number, account_type, name, currency, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                account.user_id,
                account.bank_id,
                account.account_number,
                account.account_type,
                account.name,
                account.currency,
                account.state
            ],
        )?;
        Ok(())
    }

    pub fn insert_category(&self, group: CategoryGroup, category: &Category) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (name, icon, is_fixed, user_id) VALUES (?1, ?2, ?3, ?4)",
                category_table(group)
            ),
            params![category.name, category.icon, category.is_fixed, category.user_id],
        )?;
        Ok(())
    }
}

fn decode_record(row: &Row<'_>, kind: RecordKind, user_id: &str) -> rusqlite::Result<FinancialRecord> {
    let liquidity: Option<String> = row.get(8)?;
    let liquidity = liquidity
        .map(|s| s.parse::<Liquidity>())
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, e.into()))?;

    Ok(FinancialRecord {
        id: row.get(0)?,
        user_id: user_id.to_string(),
        kind,
        amount: MonetaryAmount {
            value: row.get(1)?,
            currency: row.get(7)?,
        },
        date: row.get(2)?,
        planned: row.get(3)?,
        category: row.get(4)?,
        counterparty: row.get(5)?,
        account: row.get(6)?,
        liquidity,
        payment: row.get(9)?,
    })
}

impl RecordStore for SqliteStore {
    #[instrument(skip(self), fields(kind = %query.kind))]
    fn fetch_records(&self, query: &RecordQuery<'_>) -> Result<Vec<FinancialRecord>> {
        let l = layout(query.kind);
        let sql = format!(
            "SELECT id, amount, date, planned, {}, {}, connected_account, currency_code, {}, {}
             FROM {} WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date DESC LIMIT ?4 OFFSET ?5",
            l.category, l.counterparty, l.liquidity, l.payment, l.table
        );

        let start = query
            .start
            .map_or_else(|| "0000-01-01".to_string(), |d| d.format(DATE_FORMAT).to_string());
        let end = query.end.format(DATE_FORMAT).to_string();
        let (limit, offset) = query
            .page
            .map_or((-1_i64, 0_i64), |p| (i64::from(p.limit), i64::from(p.offset)));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![query.user_id, start, end, limit, offset], |row| {
                decode_record(row, query.kind, query.user_id)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("error scanning {}", query.kind))?;

        debug!(count = records.len(), "Fetched records");
        Ok(records)
    }

    fn fetch_subscription(&self, user_id: &str) -> Result<Option<Subscription>> {
        let conn = self.conn()?;
        let subscription = conn
            .query_row(
                "SELECT id, user_id, start_date, end_date, is_active FROM subscriptions WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(Subscription {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        start_date: row.get(2)?,
                        end_date: row.get(3)?,
                        is_active: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(subscription)
    }

    fn fetch_connected_accounts(&self, user_id: &str) -> Result<Vec<ConnectedAccount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, bank_id, account_number, account_type, name, currency, state
             FROM connected_accounts WHERE user_id = ?1",
        )?;
        let accounts = stmt
            .query_map(params![user_id], |row| {
                Ok(ConnectedAccount {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    bank_id: row.get(2)?,
                    account_number: row.get(3)?,
                    account_type: row.get(4)?,
                    name: row.get(5)?,
                    currency: row.get(6)?,
                    state: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(accounts)
    }

    fn fetch_categories(&self, user_id: &str, group: CategoryGroup) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name, icon, is_fixed, user_id FROM {} WHERE user_id = ?1",
            category_table(group)
        ))?;
        let categories = stmt
            .query_map(params![user_id], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    icon: row.get(2)?,
                    is_fixed: row.get(3)?,
                    user_id: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }
}
