//! Persistence: transactional inserts returning the store-assigned fields, and
//! the request flow that writes a request together with its line items.

use sqlx::{
    query_builder::Separated, sqlite::SqliteRow, FromRow, QueryBuilder, Sqlite, SqliteConnection,
    SqlitePool,
};

use crate::{
    errors::StoreError,
    structs::{
        Hardware, HardwareInRequest, HardwareInsert, Location, LocationInsert, Rack, RackInsert,
        Request, RequestBase, RequestHardware, RequestInsert, Stock, StockInsert, Terminal,
        TerminalInsert, User, UserInsert,
    },
};

/// A record that can be written as one row of `TABLE`.
pub trait Insertable {
    /// The row as read back after the insert, server-assigned fields included.
    type Stored: for<'r> FromRow<'r, SqliteRow> + Send + Unpin;

    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    /// Binds one value per entry of `COLUMNS`, in the same order.
    fn push_row<'args>(&'args self, row: &mut Separated<'_, 'args, Sqlite, &'static str>);
}

fn insert_statement<'args, T: Insertable>(records: &'args [T]) -> QueryBuilder<'args, Sqlite> {
    let columns = T::COLUMNS
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let mut builder = QueryBuilder::new(format!("INSERT INTO \"{}\" ({}) ", T::TABLE, columns));
    builder.push_values(records, |mut row, record| record.push_row(&mut row));
    builder
}

/// Inserts one row inside the caller's transaction.
pub async fn insert_row<T: Insertable>(
    conn: &mut SqliteConnection,
    record: &T,
) -> Result<T::Stored, StoreError> {
    let mut builder = insert_statement(std::slice::from_ref(record));
    builder.push(" RETURNING *");
    let statement = builder.sql().to_owned();
    builder
        .build_query_as::<T::Stored>()
        .fetch_one(conn)
        .await
        .map_err(|e| StoreError::statement(statement, e))
}

/// Inserts all records with a single statement inside the caller's transaction.
pub async fn insert_rows<T: Insertable>(
    conn: &mut SqliteConnection,
    records: &[T],
) -> Result<Vec<T::Stored>, StoreError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = insert_statement(records);
    builder.push(" RETURNING *");
    let statement = builder.sql().to_owned();
    builder
        .build_query_as::<T::Stored>()
        .fetch_all(conn)
        .await
        .map_err(|e| StoreError::statement(statement, e))
}

/// Like [`insert_rows`] but skips reading the rows back. Returns the row count.
pub async fn insert_rows_unreturned<T: Insertable>(
    conn: &mut SqliteConnection,
    records: &[T],
) -> Result<u64, StoreError> {
    if records.is_empty() {
        return Ok(0);
    }
    let mut builder = insert_statement(records);
    let statement = builder.sql().to_owned();
    builder
        .build()
        .execute(conn)
        .await
        .map(|done| done.rows_affected())
        .map_err(|e| StoreError::statement(statement, e))
}

pub async fn insert_one<T: Insertable>(
    pool: &SqlitePool,
    record: &T,
) -> Result<T::Stored, StoreError> {
    let mut tx = pool.begin().await?;
    let stored = insert_row(&mut tx, record).await?;
    tx.commit().await?;
    log::debug!("Inserted one row into {}", T::TABLE);
    Ok(stored)
}

pub async fn insert_many<T: Insertable>(
    pool: &SqlitePool,
    records: &[T],
) -> Result<Vec<T::Stored>, StoreError> {
    let mut tx = pool.begin().await?;
    let stored = insert_rows(&mut tx, records).await?;
    tx.commit().await?;
    log::debug!("Inserted {} row(s) into {}", stored.len(), T::TABLE);
    Ok(stored)
}

const FIND_STOCK: &str =
    "SELECT id FROM stock WHERE hardware = $1 AND count >= $2 ORDER BY id LIMIT 1";
const CHECK_STOCK: &str = "SELECT id FROM stock WHERE id = $1 AND hardware = $2 AND count >= $3";

/// Picks the stock slot a line item draws from: the pinned one when the
/// caller named it, otherwise the lowest-id slot of that hardware holding
/// enough items.
async fn resolve_stock(
    conn: &mut SqliteConnection,
    line: &HardwareInRequest,
) -> Result<i64, StoreError> {
    match line.stock {
        Some(stock) => sqlx::query_scalar::<_, i64>(CHECK_STOCK)
            .bind(stock)
            .bind(line.hardware)
            .bind(line.count)
            .fetch_optional(conn)
            .await
            .map_err(|e| StoreError::statement(CHECK_STOCK, e))?
            .ok_or(StoreError::StockMismatch {
                stock,
                hardware: line.hardware,
                count: line.count,
            }),
        None => sqlx::query_scalar::<_, i64>(FIND_STOCK)
            .bind(line.hardware)
            .bind(line.count)
            .fetch_optional(conn)
            .await
            .map_err(|e| StoreError::statement(FIND_STOCK, e))?
            .ok_or(StoreError::StockUnavailable {
                hardware: line.hardware,
                count: line.count,
            }),
    }
}

/// Stores a request and its line items in one transaction.
///
/// The request row goes first so its id can key the line items. Any failure
/// after that drops the transaction, which rolls the request row back too.
pub async fn create_request(
    pool: &SqlitePool,
    payload: RequestInsert,
) -> Result<Request, StoreError> {
    let RequestInsert { request, hardware } = payload;

    let mut tx = pool.begin().await?;
    let stored = insert_row(&mut tx, &request).await?;

    let mut items = Vec::with_capacity(hardware.len());
    for line in &hardware {
        let stock = resolve_stock(&mut tx, line).await?;
        items.push(RequestHardware {
            request: stored.id,
            hardware: line.hardware,
            stock,
            count: line.count,
        });
    }
    let written = insert_rows_unreturned(&mut tx, &items).await?;

    tx.commit().await?;
    log::info!("Request {} created with {} line item(s)", stored.id, written);
    Ok(stored)
}

impl Insertable for UserInsert {
    type Stored = User;

    const TABLE: &'static str = "user";
    const COLUMNS: &'static [&'static str] = &[
        "active",
        "type",
        "first_name",
        "last_name",
        "patronymic",
        "image_link",
        "email",
        "phone",
        "card_id",
        "card_key",
        "comment",
    ];

    fn push_row<'args>(&'args self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.active)
            .push_bind(self.user_type)
            .push_bind(self.first_name.as_deref())
            .push_bind(self.last_name.as_deref())
            .push_bind(self.patronymic.as_deref())
            .push_bind(self.image_link.as_deref())
            .push_bind(self.email.as_str())
            .push_bind(self.phone.as_deref())
            .push_bind(self.card_id.as_deref())
            .push_bind(self.card_key.as_deref())
            .push_bind(self.comment.as_str());
    }
}

impl Insertable for LocationInsert {
    type Stored = Location;

    const TABLE: &'static str = "location";
    const COLUMNS: &'static [&'static str] = &["name", "width", "height"];

    fn push_row<'args>(&'args self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.name.as_str())
            .push_bind(self.width)
            .push_bind(self.height);
    }
}

impl Insertable for TerminalInsert {
    type Stored = Terminal;

    const TABLE: &'static str = "terminal";
    const COLUMNS: &'static [&'static str] = &["name", "location", "x", "y"];

    fn push_row<'args>(&'args self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.name.as_str())
            .push_bind(self.location)
            .push_bind(self.x)
            .push_bind(self.y);
    }
}

impl Insertable for HardwareInsert {
    type Stored = Hardware;

    const TABLE: &'static str = "hardware";
    const COLUMNS: &'static [&'static str] =
        &["name", "type", "description", "image_link", "specifications"];

    fn push_row<'args>(&'args self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.name.as_str())
            .push_bind(self.hardware_type)
            .push_bind(self.description.as_str())
            .push_bind(self.image_link.as_deref())
            .push_bind(&self.specifications);
    }
}

impl Insertable for RackInsert {
    type Stored = Rack;

    const TABLE: &'static str = "rack";
    const COLUMNS: &'static [&'static str] = &["location", "width", "height", "x", "y"];

    fn push_row<'args>(&'args self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.location)
            .push_bind(self.width)
            .push_bind(self.height)
            .push_bind(self.x)
            .push_bind(self.y);
    }
}

impl Insertable for StockInsert {
    type Stored = Stock;

    const TABLE: &'static str = "stock";
    const COLUMNS: &'static [&'static str] = &["hardware", "rack", "rack_position", "count"];

    fn push_row<'args>(&'args self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.hardware)
            .push_bind(self.rack)
            .push_bind(self.rack_position)
            .push_bind(self.count);
    }
}

impl Insertable for RequestBase {
    type Stored = Request;

    const TABLE: &'static str = "request";
    const COLUMNS: &'static [&'static str] = &[
        "user",
        "location",
        "status",
        "comment",
        "taken_date",
        "return_date",
        "issued_by",
    ];

    fn push_row<'args>(&'args self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.user)
            .push_bind(self.location)
            .push_bind(self.status)
            .push_bind(self.comment.as_str())
            .push_bind(self.taken_date)
            .push_bind(self.return_date)
            .push_bind(self.issued_by);
    }
}

impl Insertable for RequestHardware {
    type Stored = RequestHardware;

    const TABLE: &'static str = "request_hardware";
    const COLUMNS: &'static [&'static str] = &["request", "hardware", "stock", "count"];

    fn push_row<'args>(&'args self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.request)
            .push_bind(self.hardware)
            .push_bind(self.stock)
            .push_bind(self.count);
    }
}
