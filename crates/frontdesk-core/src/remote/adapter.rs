//! Entity <-> remote row mapping
//!
//! The remote schema is not the local one: field names are camelCase and
//! renamed (`roomNo`, `arrival`, `amountMinor`), dates travel as `%Y-%m-%d`
//! strings, and a reservation's payments and services are nested JSON
//! collections on its row. `from_remote(kind, to_remote(e))` must preserve
//! every domain field of `e`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{
    Client, EntityKind, EntityPayload, Payment, PaymentMethod, Reservation, ReservationStatus,
    Room, ServiceCharge, ServiceItem, Tax, User,
};

const REMOTE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Translate a local entity into its remote row
pub fn to_remote(payload: &EntityPayload) -> Result<Value> {
    let value = match payload {
        EntityPayload::Room(r) => serde_json::to_value(RemoteRoom::from(r)),
        EntityPayload::Client(c) => serde_json::to_value(RemoteClient::from(c)),
        EntityPayload::Reservation(r) => serde_json::to_value(RemoteReservation::from(r)),
        EntityPayload::Tax(t) => serde_json::to_value(RemoteTax::from(t)),
        EntityPayload::PaymentMethod(m) => serde_json::to_value(RemotePaymentMethod::from(m)),
        EntityPayload::Service(s) => serde_json::to_value(RemoteServiceItem::from(s)),
        EntityPayload::User(u) => serde_json::to_value(RemoteUser::from(u)),
    }?;
    Ok(value)
}

/// Translate a remote row back into a local entity.
///
/// Rows that fail to translate are reported as [`Error::Mapping`]; the pull
/// phase skips them and keeps going.
pub fn from_remote(kind: EntityKind, row: &Value) -> Result<EntityPayload> {
    let payload = match kind {
        EntityKind::Rooms => EntityPayload::Room(parse_row::<RemoteRoom>(kind, row)?.into()),
        EntityKind::Clients => EntityPayload::Client(parse_row::<RemoteClient>(kind, row)?.into()),
        EntityKind::Reservations => {
            EntityPayload::Reservation(parse_row::<RemoteReservation>(kind, row)?.try_into()?)
        }
        EntityKind::Taxes => EntityPayload::Tax(parse_row::<RemoteTax>(kind, row)?.into()),
        EntityKind::PaymentMethods => {
            EntityPayload::PaymentMethod(parse_row::<RemotePaymentMethod>(kind, row)?.into())
        }
        EntityKind::Services => {
            EntityPayload::Service(parse_row::<RemoteServiceItem>(kind, row)?.into())
        }
        EntityKind::Users => EntityPayload::User(parse_row::<RemoteUser>(kind, row)?.into()),
    };
    Ok(payload)
}

/// Extract the id column from a remote row without full translation
pub fn remote_row_id(row: &Value) -> Result<String> {
    row.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Mapping("remote row is missing an 'id' field".to_string()))
}

fn parse_row<T: for<'de> Deserialize<'de>>(kind: EntityKind, row: &Value) -> Result<T> {
    serde_json::from_value(row.clone())
        .map_err(|error| Error::Mapping(format!("invalid {kind} row: {error}")))
}

fn parse_remote_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, REMOTE_DATE_FORMAT)
        .map_err(|error| Error::Mapping(format!("invalid {field} date '{value}': {error}")))
}

fn encode_remote_date(date: NaiveDate) -> String {
    date.format(REMOTE_DATE_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Remote row shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RemoteRoom {
    id: String,
    room_no: String,
    category_name: String,
    floor_no: i32,
    out_of_service: bool,
}

impl From<&Room> for RemoteRoom {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.clone(),
            room_no: room.number.clone(),
            category_name: room.category.clone(),
            floor_no: room.floor,
            out_of_service: room.out_of_service,
        }
    }
}

impl From<RemoteRoom> for Room {
    fn from(row: RemoteRoom) -> Self {
        Self {
            id: row.id,
            number: row.room_no,
            category: row.category_name,
            floor: row.floor_no,
            out_of_service: row.out_of_service,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RemoteClient {
    id: String,
    full_name: String,
    email: Option<String>,
    phone: Option<String>,
    balance_minor: i64,
    account_holder: bool,
}

impl From<&Client> for RemoteClient {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id.clone(),
            full_name: client.name.clone(),
            email: client.email.clone(),
            phone: client.phone.clone(),
            balance_minor: client.balance_cents,
            account_holder: client.is_account_holder,
        }
    }
}

impl From<RemoteClient> for Client {
    fn from(row: RemoteClient) -> Self {
        Self {
            id: row.id,
            name: row.full_name,
            email: row.email,
            phone: row.phone,
            balance_cents: row.balance_minor,
            is_account_holder: row.account_holder,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RemotePayment {
    id: String,
    method_id: String,
    amount_minor: i64,
    received_on: String,
}

impl From<&Payment> for RemotePayment {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id.clone(),
            method_id: payment.method_id.clone(),
            amount_minor: payment.amount_cents,
            received_on: encode_remote_date(payment.received_on),
        }
    }
}

impl TryFrom<RemotePayment> for Payment {
    type Error = Error;

    fn try_from(row: RemotePayment) -> Result<Self> {
        Ok(Self {
            id: row.id,
            method_id: row.method_id,
            amount_cents: row.amount_minor,
            received_on: parse_remote_date(&row.received_on, "receivedOn")?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RemoteServiceCharge {
    id: String,
    service_id: String,
    qty: u32,
    unit_price_minor: i64,
}

impl From<&ServiceCharge> for RemoteServiceCharge {
    fn from(charge: &ServiceCharge) -> Self {
        Self {
            id: charge.id.clone(),
            service_id: charge.service_id.clone(),
            qty: charge.quantity,
            unit_price_minor: charge.unit_price_cents,
        }
    }
}

impl From<RemoteServiceCharge> for ServiceCharge {
    fn from(row: RemoteServiceCharge) -> Self {
        Self {
            id: row.id,
            service_id: row.service_id,
            quantity: row.qty,
            unit_price_cents: row.unit_price_minor,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RemoteReservation {
    id: String,
    room_id: String,
    client_id: String,
    arrival: String,
    departure: String,
    state: String,
    #[serde(default)]
    payments: Vec<RemotePayment>,
    #[serde(default)]
    services: Vec<RemoteServiceCharge>,
    deposit_minor: i64,
    rate_minor: i64,
    total_minor: i64,
    remarks: String,
}

impl From<&Reservation> for RemoteReservation {
    fn from(res: &Reservation) -> Self {
        Self {
            id: res.id.clone(),
            room_id: res.room_id.clone(),
            client_id: res.client_id.clone(),
            arrival: encode_remote_date(res.check_in),
            departure: encode_remote_date(res.check_out),
            state: encode_status(res.status).to_string(),
            payments: res.payments.iter().map(RemotePayment::from).collect(),
            services: res.services.iter().map(RemoteServiceCharge::from).collect(),
            deposit_minor: res.deposit_cents,
            rate_minor: res.base_rate_cents,
            total_minor: res.total_cents,
            remarks: res.notes.clone(),
        }
    }
}

impl TryFrom<RemoteReservation> for Reservation {
    type Error = Error;

    fn try_from(row: RemoteReservation) -> Result<Self> {
        let payments = row
            .payments
            .into_iter()
            .map(Payment::try_from)
            .collect::<Result<Vec<_>>>()?;
        let services = row.services.into_iter().map(ServiceCharge::from).collect();

        Ok(Self {
            id: row.id,
            room_id: row.room_id,
            client_id: row.client_id,
            check_in: parse_remote_date(&row.arrival, "arrival")?,
            check_out: parse_remote_date(&row.departure, "departure")?,
            status: parse_status(&row.state)?,
            payments,
            services,
            deposit_cents: row.deposit_minor,
            base_rate_cents: row.rate_minor,
            total_cents: row.total_minor,
            notes: row.remarks,
        })
    }
}

const fn encode_status(status: ReservationStatus) -> &'static str {
    match status {
        ReservationStatus::Option => "option",
        ReservationStatus::Confirmed => "confirmed",
        ReservationStatus::CheckedIn => "checked_in",
        ReservationStatus::CheckedOut => "checked_out",
        ReservationStatus::Cancelled => "cancelled",
    }
}

fn parse_status(value: &str) -> Result<ReservationStatus> {
    match value {
        "option" => Ok(ReservationStatus::Option),
        "confirmed" => Ok(ReservationStatus::Confirmed),
        "checked_in" => Ok(ReservationStatus::CheckedIn),
        "checked_out" => Ok(ReservationStatus::CheckedOut),
        "cancelled" => Ok(ReservationStatus::Cancelled),
        other => Err(Error::Mapping(format!("unknown reservation state: {other}"))),
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RemoteTax {
    id: String,
    label: String,
    rate_permille: u32,
}

impl From<&Tax> for RemoteTax {
    fn from(tax: &Tax) -> Self {
        Self {
            id: tax.id.clone(),
            label: tax.name.clone(),
            rate_permille: tax.rate_permille,
        }
    }
}

impl From<RemoteTax> for Tax {
    fn from(row: RemoteTax) -> Self {
        Self {
            id: row.id,
            name: row.label,
            rate_permille: row.rate_permille,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RemotePaymentMethod {
    id: String,
    label: String,
    active: bool,
}

impl From<&PaymentMethod> for RemotePaymentMethod {
    fn from(method: &PaymentMethod) -> Self {
        Self {
            id: method.id.clone(),
            label: method.name.clone(),
            active: method.enabled,
        }
    }
}

impl From<RemotePaymentMethod> for PaymentMethod {
    fn from(row: RemotePaymentMethod) -> Self {
        Self {
            id: row.id,
            name: row.label,
            enabled: row.active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RemoteServiceItem {
    id: String,
    label: String,
    price_minor: i64,
    active: bool,
}

impl From<&ServiceItem> for RemoteServiceItem {
    fn from(item: &ServiceItem) -> Self {
        Self {
            id: item.id.clone(),
            label: item.name.clone(),
            price_minor: item.price_cents,
            active: item.enabled,
        }
    }
}

impl From<RemoteServiceItem> for ServiceItem {
    fn from(row: RemoteServiceItem) -> Self {
        Self {
            id: row.id,
            name: row.label,
            price_cents: row.price_minor,
            enabled: row.active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RemoteUser {
    id: String,
    login: String,
    display_name: String,
    role: String,
}

impl From<&User> for RemoteUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            login: user.username.clone(),
            display_name: user.display_name.clone(),
            role: user.role.clone(),
        }
    }
}

impl From<RemoteUser> for User {
    fn from(row: RemoteUser) -> Self {
        Self {
            id: row.id,
            username: row.login,
            display_name: row.display_name,
            role: row.role,
        }
    }
}
