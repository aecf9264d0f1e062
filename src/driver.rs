//! Line-oriented JSON front end: one request per input line, one response
//! per output line.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::directory::InMemoryDirectory;
use crate::engine::{Engine, EngineError};
use crate::model::*;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    RegisterIdentity {
        identity_id: Ulid,
    },
    RegisterSchedulable(SchedulableResource),
    RegisterPatient {
        patient_id: Ulid,
    },
    CreateSchedule {
        #[serde(default)]
        id: Option<Ulid>,
        resource_id: Ulid,
        valid_from: NaiveDate,
        valid_to: NaiveDate,
    },
    CreateAvailability {
        #[serde(default)]
        id: Option<Ulid>,
        schedule_id: Ulid,
        slot_type: SlotType,
        slot_size_in_minutes: u32,
        tokens_per_slot: u32,
        windows: Vec<RecurrenceWindow>,
    },
    QuerySlots(SlotQuery),
    CreateBooking(BookingRequest),
    GetSlot {
        slot_id: Ulid,
    },
    ListBookings {
        slot_id: Ulid,
    },
    GetBooking {
        booking_id: Ulid,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Ok(serde_json::Value),
    Error(ErrorBody),
}

impl Response {
    fn ok<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Response::Ok(v),
            Err(e) => Response::error("internal", e.to_string()),
        }
    }

    fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error(ErrorBody {
            code: code.to_string(),
            message: message.into(),
        })
    }
}

impl From<EngineError> for Response {
    fn from(e: EngineError) -> Self {
        Response::error(e.code(), e.to_string())
    }
}

fn respond<T: Serialize>(result: Result<T, EngineError>) -> Response {
    match result {
        Ok(value) => Response::ok(&value),
        Err(e) => e.into(),
    }
}

pub struct Driver {
    engine: Arc<Engine>,
    directory: Arc<InMemoryDirectory>,
}

impl Driver {
    pub fn new(engine: Arc<Engine>, directory: Arc<InMemoryDirectory>) -> Self {
        Self { engine, directory }
    }

    /// Parse and execute one request line. Never fails: bad input becomes an error response.
    pub async fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                debug!("unparseable request: {e}");
                Response::error("bad_request", e.to_string())
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Response {
        match request {
            Request::RegisterIdentity { identity_id } => {
                self.directory.register_identity(identity_id);
                Response::ok(&identity_id)
            }
            Request::RegisterSchedulable(resource) => {
                self.directory.register_schedulable(resource.clone());
                Response::ok(&resource)
            }
            Request::RegisterPatient { patient_id } => {
                self.directory.register_patient(patient_id);
                Response::ok(&patient_id)
            }
            Request::CreateSchedule {
                id,
                resource_id,
                valid_from,
                valid_to,
            } => respond(
                self.engine
                    .create_schedule(id.unwrap_or_else(Ulid::new), resource_id, valid_from, valid_to)
                    .await,
            ),
            Request::CreateAvailability {
                id,
                schedule_id,
                slot_type,
                slot_size_in_minutes,
                tokens_per_slot,
                windows,
            } => {
                let availability = Availability {
                    id: id.unwrap_or_else(Ulid::new),
                    schedule_id,
                    slot_type,
                    slot_size_in_minutes,
                    tokens_per_slot,
                    windows,
                };
                respond(self.engine.create_availability(availability).await)
            }
            Request::QuerySlots(query) => respond(self.engine.query_slots(&query).await),
            Request::CreateBooking(request) => respond(self.engine.create_booking(request).await),
            Request::GetSlot { slot_id } => respond(self.engine.get_slot(&slot_id)),
            Request::ListBookings { slot_id } => respond(self.engine.list_bookings(&slot_id)),
            Request::GetBooking { booking_id } => respond(self.engine.get_booking(&booking_id)),
        }
    }

    /// Serve requests until `reader` hits EOF.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let response = self.handle_line(&line).await;
            if let Response::Error(ref body) = response {
                warn!(code = %body.code, "request rejected: {}", body.message);
            }
            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
        }
        Ok(())
    }
}
