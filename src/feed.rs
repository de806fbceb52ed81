//! In-memory transit feed model.
//!
//! A [`Feed`] owns one ordered collection per GTFS table kind. Entities
//! reference each other by id (plain `String`s), not by pointer; the writer
//! never chases references across collections except to collect entity-level
//! attributions.
//!
//! Optionality is modelled with `Option` instead of sentinel values: an
//! unset `transfer_duration` is `None`, not `-1`, and the encoding layer
//! turns it into an empty cell.
//!
//! # Extension fields
//!
//! Upstream stages may attach columns that are not part of a table's fixed
//! schema. Those live in [`ExtraFields`]: per table, a map from column name
//! to per-entity values. The child-expanded tables (shapes, stop-times) key
//! values by `(parent id, child sequence)`. Column maps are `BTreeMap`s so
//! discovered extension columns always come out in a stable order.

use std::collections::{BTreeMap, HashMap};

/// Calendar date, valid Gregorian. `Option<ServiceDate>` models "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServiceDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl ServiceDate {
    pub fn new(year: u16, month: u8, day: u8) -> Self {
        ServiceDate { year, month, day }
    }
}

/// Time of day. Hours past 24 are legal (trips crossing midnight).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
}

impl Time {
    pub fn new(hour: u8, min: u8, sec: u8) -> Self {
        Time { hour, min, sec }
    }
}

impl Default for Time {
    fn default() -> Self {
        Time::new(0, 0, 0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Agency {
    pub id: String,
    pub name: String,
    pub url: String,
    pub timezone: String,
    pub lang: String,
    pub phone: String,
    pub fare_url: Option<String>,
    pub email: Option<String>,
    /// Attributions owned by this agency, written to the attributions table
    /// with this agency's id.
    pub attributions: Vec<Attribution>,
}

#[derive(Debug, Clone, Default)]
pub struct FeedInfo {
    pub publisher_name: String,
    pub publisher_url: String,
    pub lang: String,
    pub start_date: Option<ServiceDate>,
    pub end_date: Option<ServiceDate>,
    pub version: String,
    pub contact_email: Option<String>,
    pub contact_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Stop {
    pub id: String,
    pub code: String,
    pub name: String,
    pub desc: String,
    /// Stops of some location types (e.g. generic nodes) have no position.
    pub lat_lon: Option<(f32, f32)>,
    pub zone_id: String,
    pub url: Option<String>,
    /// 0 is the GTFS default and is written as an empty cell.
    pub location_type: u8,
    pub parent_station: Option<String>,
    pub timezone: String,
    /// Tri-state; 0 ("no information") is written as an empty cell.
    pub wheelchair_boarding: u8,
    pub level_id: Option<String>,
    pub platform_code: String,
}

#[derive(Debug, Clone, Default)]
pub struct Route {
    pub id: String,
    pub agency_id: Option<String>,
    pub short_name: String,
    pub long_name: String,
    pub desc: String,
    pub route_type: u16,
    pub url: Option<String>,
    /// Six hex digits; the GTFS default `FFFFFF` is suppressed on output.
    pub color: String,
    /// Six hex digits; the GTFS default `000000` is suppressed on output.
    pub text_color: String,
    pub sort_order: Option<u32>,
    /// 1 ("no continuous pickup") is the GTFS default, written empty.
    pub continuous_pickup: u8,
    pub continuous_drop_off: u8,
    pub attributions: Vec<Attribution>,
}

impl Route {
    pub fn new(id: impl Into<String>) -> Self {
        Route {
            id: id.into(),
            continuous_pickup: 1,
            continuous_drop_off: 1,
            ..Route::default()
        }
    }
}

/// Service calendar: a weekday bitmap over a date range plus explicit
/// per-date exceptions.
#[derive(Debug, Clone, Default)]
pub struct Service {
    pub id: String,
    /// Bit 0 = Monday ... bit 6 = Sunday.
    pub weekdays: u8,
    pub start_date: Option<ServiceDate>,
    pub end_date: Option<ServiceDate>,
    /// Date -> service added (`true`) or removed (`false`).
    pub exceptions: BTreeMap<ServiceDate, bool>,
}

impl Service {
    pub fn new(id: impl Into<String>) -> Self {
        Service {
            id: id.into(),
            ..Service::default()
        }
    }

    pub fn runs_on(&self, weekday: u8) -> bool {
        self.weekdays & (1 << weekday) != 0
    }

    /// A service with no weekdays and no exceptions still gets a calendar
    /// row so its id stays defined.
    pub fn is_empty(&self) -> bool {
        self.weekdays == 0 && self.exceptions.is_empty()
    }

    pub fn first_exception_date(&self) -> Option<ServiceDate> {
        self.exceptions.keys().next().copied()
    }

    pub fn last_exception_date(&self) -> Option<ServiceDate> {
        self.exceptions.keys().next_back().copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Trip {
    pub id: String,
    pub route_id: String,
    pub service_id: String,
    pub headsign: String,
    pub short_name: String,
    pub direction_id: Option<u8>,
    pub block_id: String,
    pub shape_id: Option<String>,
    /// Tri-state; 0 is written as an empty cell.
    pub wheelchair_accessible: u8,
    pub bikes_allowed: u8,
    pub stop_times: Vec<StopTime>,
    pub frequencies: Vec<Frequency>,
    pub attributions: Vec<Attribution>,
}

impl Trip {
    pub fn new(id: impl Into<String>) -> Self {
        Trip {
            id: id.into(),
            ..Trip::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct StopTime {
    /// Arrival and departure are either both set or both unset.
    pub arrival: Option<Time>,
    pub departure: Option<Time>,
    pub stop_id: String,
    pub sequence: u32,
    pub headsign: String,
    /// 0 ("regular") is the GTFS default, written empty.
    pub pickup_type: u8,
    pub drop_off_type: u8,
    /// 1 ("no continuous pickup") is the GTFS default, written empty.
    pub continuous_pickup: u8,
    pub continuous_drop_off: u8,
    pub shape_dist_traveled: Option<f32>,
    /// Exact timepoint; the default `true` is written empty, `false` as "0".
    pub timepoint: bool,
}

impl Default for StopTime {
    fn default() -> Self {
        StopTime {
            arrival: None,
            departure: None,
            stop_id: String::new(),
            sequence: 0,
            headsign: String::new(),
            pickup_type: 0,
            drop_off_type: 0,
            continuous_pickup: 1,
            continuous_drop_off: 1,
            shape_dist_traveled: None,
            timepoint: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Frequency {
    pub start_time: Time,
    pub end_time: Time,
    pub headway_secs: u32,
    pub exact_times: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Shape {
    pub id: String,
    /// Points in sequence order; the writer never reorders them.
    pub points: Vec<ShapePoint>,
}

#[derive(Debug, Clone, Copy)]
pub struct ShapePoint {
    pub lat: f32,
    pub lon: f32,
    pub sequence: u32,
    pub dist_traveled: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct FareAttribute {
    pub id: String,
    pub price: String,
    pub currency: String,
    pub payment_method: u8,
    pub transfers: Option<u32>,
    pub transfer_duration: Option<u32>,
    pub agency_id: Option<String>,
    pub rules: Vec<FareRule>,
}

#[derive(Debug, Clone, Default)]
pub struct FareRule {
    pub route_id: Option<String>,
    pub origin_id: String,
    pub destination_id: String,
    pub contains_id: String,
}

/// Transfers have no id of their own, so equality covers every field and
/// the writer deduplicates on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Transfer {
    pub from_stop_id: String,
    pub to_stop_id: String,
    /// 0 ("recommended transfer point") is the GTFS default, written empty.
    pub transfer_type: u8,
    pub min_transfer_time: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct Level {
    pub id: String,
    pub index: f32,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct Pathway {
    pub id: String,
    pub from_stop_id: String,
    pub to_stop_id: String,
    pub mode: u8,
    pub is_bidirectional: bool,
    pub length: Option<f32>,
    pub traversal_time: Option<u32>,
    /// 0 means "unset" here: a pathway cannot have zero stairs and still
    /// list a stair count.
    pub stair_count: i32,
    /// 0 means "unset".
    pub max_slope: f32,
    pub min_width: Option<f32>,
    pub signposted_as: String,
    pub reversed_signposted_as: String,
}

#[derive(Debug, Clone, Default)]
pub struct Attribution {
    pub id: String,
    pub organization_name: String,
    pub is_producer: bool,
    pub is_operator: bool,
    pub is_authority: bool,
    pub url: Option<String>,
    pub email: Option<String>,
    pub phone: String,
}

/// Extension-column values for one table: column name -> entity id -> value.
pub type ExtMap = BTreeMap<String, HashMap<String, String>>;

/// Extension-column values for a child-expanded table:
/// column name -> (parent id, child sequence) -> value.
pub type ExtSeqMap = BTreeMap<String, HashMap<(String, u32), String>>;

/// Extension columns carried alongside the fixed schemas, one map per table.
///
/// Maps are keyed by the entity's id where one exists. Tables without a
/// natural id use: publisher name for feed infos, the owning fare id for
/// fare rules, the owning trip id for frequencies, and
/// `"<from_stop_id>|<to_stop_id>"` for transfers.
#[derive(Debug, Clone, Default)]
pub struct ExtraFields {
    pub agencies: ExtMap,
    pub feed_infos: ExtMap,
    pub stops: ExtMap,
    pub routes: ExtMap,
    pub trips: ExtMap,
    pub stop_times: ExtSeqMap,
    pub shapes: ExtSeqMap,
    pub fare_attributes: ExtMap,
    pub fare_rules: ExtMap,
    pub frequencies: ExtMap,
    pub transfers: ExtMap,
    pub levels: ExtMap,
    pub pathways: ExtMap,
    pub attributions: ExtMap,
}

/// Caller-preferred column orders, consulted when the writer is asked to
/// keep the original column order of a previously read feed.
#[derive(Debug, Clone, Default)]
pub struct ColumnOrders {
    pub agencies: Vec<String>,
    pub feed_infos: Vec<String>,
    pub stops: Vec<String>,
    pub routes: Vec<String>,
    pub calendar: Vec<String>,
    pub calendar_dates: Vec<String>,
    pub trips: Vec<String>,
    pub stop_times: Vec<String>,
    pub shapes: Vec<String>,
    pub fare_attributes: Vec<String>,
    pub fare_rules: Vec<String>,
    pub frequencies: Vec<String>,
    pub transfers: Vec<String>,
    pub levels: Vec<String>,
    pub pathways: Vec<String>,
    pub attributions: Vec<String>,
}

/// A complete in-memory transit feed.
///
/// Collections keep insertion order; the writer only reorders output when
/// its sorted option is set.
#[derive(Debug, Clone, Default)]
pub struct Feed {
    pub agencies: Vec<Agency>,
    pub feed_infos: Vec<FeedInfo>,
    pub stops: Vec<Stop>,
    pub routes: Vec<Route>,
    pub services: Vec<Service>,
    pub trips: Vec<Trip>,
    pub shapes: Vec<Shape>,
    pub fare_attributes: Vec<FareAttribute>,
    pub transfers: Vec<Transfer>,
    pub levels: Vec<Level>,
    pub pathways: Vec<Pathway>,
    /// Feed-level attributions; entity-level ones live on their entities.
    pub attributions: Vec<Attribution>,
    pub extra: ExtraFields,
    pub column_orders: ColumnOrders,
}

impl Feed {
    pub fn new() -> Self {
        Feed::default()
    }
}
