//! Feed serialization: one projection function per GTFS table, run in a
//! fixed sequence against a single output target.
//!
//! Every table follows the same lifecycle: open its stream, declare the
//! candidate schema (fixed columns plus discovered extension columns),
//! project entities into rows, let the sink mask and order the columns, and
//! flush before the next table starts. The first I/O failure aborts the
//! remaining tables; the error names the table file that failed.
//!
//! Small tables buffer their rows in the sink. The two child-expanded
//! tables (shapes and stop-times) can run to hundreds of millions of rows,
//! so they use a two-pass protocol instead: a first traversal projects every
//! row only to record column usage (discarding the row), then a second
//! traversal in the same order emits rows straight to the stream. The two
//! passes must visit parents and children identically (modulo an optional
//! parent-level sort between them) so the emitted rows are exactly the rows
//! that were evaluated.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::encode::{gtfs_bool, nonzero_f32, nonzero_i32, opt_date, opt_f32, opt_u32, sanitize};
use crate::feed::{
    Attribution, ExtMap, ExtSeqMap, Feed, Shape, ShapePoint, StopTime, Trip,
};
use crate::sink::CsvSink;
use crate::target::{Compression, WriteTarget};

pub const AGENCY_FILE: &str = "agency.txt";
pub const FEED_INFO_FILE: &str = "feed_info.txt";
pub const STOPS_FILE: &str = "stops.txt";
pub const SHAPES_FILE: &str = "shapes.txt";
pub const ROUTES_FILE: &str = "routes.txt";
pub const CALENDAR_FILE: &str = "calendar.txt";
pub const CALENDAR_DATES_FILE: &str = "calendar_dates.txt";
pub const TRIPS_FILE: &str = "trips.txt";
pub const STOP_TIMES_FILE: &str = "stop_times.txt";
pub const FARE_ATTRIBUTES_FILE: &str = "fare_attributes.txt";
pub const FARE_RULES_FILE: &str = "fare_rules.txt";
pub const FREQUENCIES_FILE: &str = "frequencies.txt";
pub const TRANSFERS_FILE: &str = "transfers.txt";
pub const LEVELS_FILE: &str = "levels.txt";
pub const PATHWAYS_FILE: &str = "pathways.txt";
pub const ATTRIBUTIONS_FILE: &str = "attributions.txt";

/// Writes a [`Feed`] as GTFS text files, loose in a directory or packed
/// into a zip archive.
///
/// ```no_run
/// use gtfs_writer::{Feed, FeedWriter};
/// # fn main() -> anyhow::Result<()> {
/// let feed = Feed::new();
/// let writer = FeedWriter::default();
/// writer.write(&feed, "out".as_ref())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedWriter {
    /// Emit every table in a deterministic total order.
    pub sorted: bool,
    /// Write calendar rows even for services defined only through
    /// exception dates.
    pub explicit_calendar: bool,
    /// Apply the feed's caller-preferred column orders.
    pub keep_col_order: bool,
    /// Archive compression; ignored in directory mode.
    pub compression: Compression,
}

/// An attribution owned by an agency, route or trip, collected while that
/// entity's table is written and appended to the attributions table.
struct OwnedAttribution<'a> {
    attribution: &'a Attribution,
    agency_id: Option<&'a str>,
    route_id: Option<&'a str>,
    trip_id: Option<&'a str>,
}

impl FeedWriter {
    /// Write the whole feed to `path` (an existing directory, or the path
    /// of a zip archive to create).
    ///
    /// Tables are written one at a time in a fixed order; the first failure
    /// aborts the rest and surfaces the offending table's file name.
    /// Optional tables with no rows are skipped, and in directory mode a
    /// stale file of the same name from an earlier run is deleted.
    pub fn write(&self, feed: &Feed, path: &Path) -> Result<()> {
        let mut target = WriteTarget::open(path, self.compression)?;
        let mut collected: Vec<OwnedAttribution> = Vec::new();

        self.write_agencies(feed, &mut target, &mut collected)
            .with_context(|| format!("write {AGENCY_FILE}"))?;
        self.write_feed_infos(feed, &mut target)
            .with_context(|| format!("write {FEED_INFO_FILE}"))?;
        self.write_stops(feed, &mut target)
            .with_context(|| format!("write {STOPS_FILE}"))?;
        self.write_shapes(feed, &mut target)
            .with_context(|| format!("write {SHAPES_FILE}"))?;
        self.write_routes(feed, &mut target, &mut collected)
            .with_context(|| format!("write {ROUTES_FILE}"))?;
        self.write_calendar(feed, &mut target)
            .with_context(|| format!("write {CALENDAR_FILE}"))?;
        self.write_calendar_dates(feed, &mut target)
            .with_context(|| format!("write {CALENDAR_DATES_FILE}"))?;
        self.write_trips(feed, &mut target, &mut collected)
            .with_context(|| format!("write {TRIPS_FILE}"))?;
        self.write_stop_times(feed, &mut target)
            .with_context(|| format!("write {STOP_TIMES_FILE}"))?;
        self.write_fare_attributes(feed, &mut target)
            .with_context(|| format!("write {FARE_ATTRIBUTES_FILE}"))?;
        self.write_fare_rules(feed, &mut target)
            .with_context(|| format!("write {FARE_RULES_FILE}"))?;
        self.write_frequencies(feed, &mut target)
            .with_context(|| format!("write {FREQUENCIES_FILE}"))?;
        self.write_transfers(feed, &mut target)
            .with_context(|| format!("write {TRANSFERS_FILE}"))?;
        self.write_levels(feed, &mut target)
            .with_context(|| format!("write {LEVELS_FILE}"))?;
        self.write_pathways(feed, &mut target)
            .with_context(|| format!("write {PATHWAYS_FILE}"))?;
        self.write_attributions(feed, &mut target, &collected)
            .with_context(|| format!("write {ATTRIBUTIONS_FILE}"))?;

        target.finish()
    }

    fn write_agencies<'a>(
        &self,
        feed: &'a Feed,
        target: &mut WriteTarget,
        collected: &mut Vec<OwnedAttribution<'a>>,
    ) -> Result<()> {
        let mut sink = CsvSink::new(target.start_table(AGENCY_FILE)?);
        let ext = ext_columns(&feed.extra.agencies);
        sink.set_schema(
            schema(
                &[
                    "agency_id",
                    "agency_name",
                    "agency_url",
                    "agency_timezone",
                    "agency_lang",
                    "agency_phone",
                    "agency_fare_url",
                    "agency_email",
                ],
                &ext,
            ),
            &["agency_name", "agency_url", "agency_timezone"],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.agencies);
        }

        for agency in &feed.agencies {
            for attribution in &agency.attributions {
                collected.push(OwnedAttribution {
                    attribution,
                    agency_id: Some(&agency.id),
                    route_id: None,
                    trip_id: None,
                });
            }
            let mut row = vec![
                agency.id.clone(),
                sanitize(&agency.name),
                agency.url.clone(),
                agency.timezone.clone(),
                agency.lang.clone(),
                agency.phone.clone(),
                agency.fare_url.clone().unwrap_or_default(),
                agency.email.clone().unwrap_or_default(),
            ];
            push_ext(&mut row, &feed.extra.agencies, &ext, &agency.id);
            sink.push_row(row);
        }

        if self.sorted {
            sink.sort_by_prefix(1);
        }
        sink.flush()?;
        debug!("wrote {AGENCY_FILE} ({} agencies)", feed.agencies.len());
        Ok(())
    }

    fn write_feed_infos(&self, feed: &Feed, target: &mut WriteTarget) -> Result<()> {
        if feed.feed_infos.is_empty() {
            return target.remove_stale(FEED_INFO_FILE);
        }
        let mut sink = CsvSink::new(target.start_table(FEED_INFO_FILE)?);
        let ext = ext_columns(&feed.extra.feed_infos);
        sink.set_schema(
            schema(
                &[
                    "feed_publisher_name",
                    "feed_publisher_url",
                    "feed_lang",
                    "feed_start_date",
                    "feed_end_date",
                    "feed_version",
                    "feed_contact_email",
                    "feed_contact_url",
                ],
                &ext,
            ),
            &["feed_publisher_name", "feed_publisher_url", "feed_lang"],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.feed_infos);
        }

        for info in &feed.feed_infos {
            let mut row = vec![
                sanitize(&info.publisher_name),
                info.publisher_url.clone(),
                info.lang.clone(),
                opt_date(info.start_date),
                opt_date(info.end_date),
                sanitize(&info.version),
                info.contact_email.clone().unwrap_or_default(),
                info.contact_url.clone().unwrap_or_default(),
            ];
            push_ext(&mut row, &feed.extra.feed_infos, &ext, &info.publisher_name);
            sink.push_row(row);
        }
        sink.flush()
    }

    fn write_stops(&self, feed: &Feed, target: &mut WriteTarget) -> Result<()> {
        let mut sink = CsvSink::new(target.start_table(STOPS_FILE)?);
        let ext = ext_columns(&feed.extra.stops);
        sink.set_schema(
            schema(
                &[
                    "stop_name",
                    "parent_station",
                    "stop_code",
                    "zone_id",
                    "stop_id",
                    "stop_desc",
                    "stop_lat",
                    "stop_lon",
                    "stop_url",
                    "location_type",
                    "stop_timezone",
                    "wheelchair_boarding",
                    "level_id",
                    "platform_code",
                ],
                &ext,
            ),
            &["stop_name", "stop_id", "stop_lat", "stop_lon"],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.stops);
        }

        for stop in &feed.stops {
            let (lat, lon) = match stop.lat_lon {
                Some((lat, lon)) => (lat.to_string(), lon.to_string()),
                None => (String::new(), String::new()),
            };
            let mut row = vec![
                sanitize(&stop.name),
                stop.parent_station.clone().unwrap_or_default(),
                stop.code.clone(),
                stop.zone_id.clone(),
                stop.id.clone(),
                sanitize(&stop.desc),
                lat,
                lon,
                stop.url.clone().unwrap_or_default(),
                non_default(stop.location_type, 0),
                stop.timezone.clone(),
                non_default(stop.wheelchair_boarding, 0),
                stop.level_id.clone().unwrap_or_default(),
                stop.platform_code.clone(),
            ];
            push_ext(&mut row, &feed.extra.stops, &ext, &stop.id);
            sink.push_row(row);
        }

        if self.sorted {
            sink.sort_by_prefix(12);
        }
        sink.flush()?;
        debug!("wrote {STOPS_FILE} ({} stops)", feed.stops.len());
        Ok(())
    }

    fn write_shapes(&self, feed: &Feed, target: &mut WriteTarget) -> Result<()> {
        if feed.shapes.is_empty() {
            return target.remove_stale(SHAPES_FILE);
        }
        let mut sink = CsvSink::new(target.start_table(SHAPES_FILE)?);
        let ext = ext_columns_seq(&feed.extra.shapes);
        sink.set_schema(
            schema(
                &[
                    "shape_id",
                    "shape_pt_sequence",
                    "shape_pt_lat",
                    "shape_pt_lon",
                    "shape_dist_traveled",
                ],
                &ext,
            ),
            &[
                "shape_id",
                "shape_pt_sequence",
                "shape_pt_lat",
                "shape_pt_lon",
            ],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.shapes);
        }

        let mut shapes: Vec<&Shape> = feed.shapes.iter().collect();

        // Pass 1: project every row for usage only. Extension columns are
        // probed with a placeholder; the real values are not looked up
        // until pass 2.
        let mut rows = 0usize;
        for shape in &shapes {
            for point in &shape.points {
                let mut row = shape_point_row(shape, point);
                row.extend(ext.iter().map(|_| "-".to_string()));
                sink.record_usage(&row);
                rows += 1;
            }
        }

        if self.sorted {
            shapes.sort_by(|a, b| a.id.cmp(&b.id));
        }
        sink.write_header()?;

        // Pass 2: same traversal order, rows go straight to the stream.
        for shape in &shapes {
            for point in &shape.points {
                let mut row = shape_point_row(shape, point);
                for name in &ext {
                    row.push(ext_seq_value(
                        &feed.extra.shapes,
                        name,
                        &shape.id,
                        point.sequence,
                    ));
                }
                sink.write_raw(row)?;
            }
        }
        sink.flush()?;
        debug!("wrote {SHAPES_FILE} ({rows} points)");
        Ok(())
    }

    fn write_routes<'a>(
        &self,
        feed: &'a Feed,
        target: &mut WriteTarget,
        collected: &mut Vec<OwnedAttribution<'a>>,
    ) -> Result<()> {
        let mut sink = CsvSink::new(target.start_table(ROUTES_FILE)?);
        let ext = ext_columns(&feed.extra.routes);
        sink.set_schema(
            schema(
                &[
                    "route_long_name",
                    "route_short_name",
                    "agency_id",
                    "route_desc",
                    "route_type",
                    "route_id",
                    "route_url",
                    "route_color",
                    "route_text_color",
                    "route_sort_order",
                    "continuous_pickup",
                    "continuous_drop_off",
                ],
                &ext,
            ),
            &["route_long_name", "route_short_name", "route_type", "route_id"],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.routes);
        }

        for route in &feed.routes {
            for attribution in &route.attributions {
                collected.push(OwnedAttribution {
                    attribution,
                    agency_id: None,
                    route_id: Some(&route.id),
                    trip_id: None,
                });
            }
            let color = if route.color == "FFFFFF" { "" } else { &route.color };
            let text_color = if route.text_color == "000000" {
                ""
            } else {
                &route.text_color
            };
            let mut row = vec![
                sanitize(&route.long_name),
                sanitize(&route.short_name),
                route.agency_id.clone().unwrap_or_default(),
                sanitize(&route.desc),
                route.route_type.to_string(),
                route.id.clone(),
                route.url.clone().unwrap_or_default(),
                color.to_string(),
                text_color.to_string(),
                opt_u32(route.sort_order),
                non_default(route.continuous_pickup, 1),
                non_default(route.continuous_drop_off, 1),
            ];
            push_ext(&mut row, &feed.extra.routes, &ext, &route.id);
            sink.push_row(row);
        }

        if self.sorted {
            sink.sort_by_prefix(9);
        }
        sink.flush()?;
        debug!("wrote {ROUTES_FILE} ({} routes)", feed.routes.len());
        Ok(())
    }

    fn write_calendar(&self, feed: &Feed, target: &mut WriteTarget) -> Result<()> {
        let has_rows = feed
            .services
            .iter()
            .any(|s| s.weekdays != 0 || s.is_empty());
        if !has_rows && !self.explicit_calendar {
            return target.remove_stale(CALENDAR_FILE);
        }
        let mut sink = CsvSink::new(target.start_table(CALENDAR_FILE)?);
        let columns = [
            "monday",
            "tuesday",
            "wednesday",
            "thursday",
            "friday",
            "saturday",
            "sunday",
            "start_date",
            "end_date",
            "service_id",
        ];
        sink.set_schema(schema(&columns, &[]), &columns)?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.calendar);
        }

        for service in &feed.services {
            if service.weekdays != 0 || service.is_empty() {
                let mut row: Vec<String> = (0u8..7)
                    .map(|day| gtfs_bool(service.runs_on(day), true))
                    .collect();
                row.push(opt_date(service.start_date));
                row.push(opt_date(service.end_date));
                row.push(service.id.clone());
                sink.push_row(row);
            } else if self.explicit_calendar {
                // Exception-only service: an all-zero row spanning its
                // defined dates keeps the service id declared.
                let mut row: Vec<String> = (0..7).map(|_| "0".to_string()).collect();
                row.push(opt_date(service.first_exception_date()));
                row.push(opt_date(service.last_exception_date()));
                row.push(service.id.clone());
                sink.push_row(row);
            }
        }

        if self.sorted {
            sink.sort_by_prefix(10);
        }
        sink.flush()
    }

    fn write_calendar_dates(&self, feed: &Feed, target: &mut WriteTarget) -> Result<()> {
        if feed.services.iter().all(|s| s.exceptions.is_empty()) {
            return target.remove_stale(CALENDAR_DATES_FILE);
        }
        let mut sink = CsvSink::new(target.start_table(CALENDAR_DATES_FILE)?);
        let columns = ["service_id", "exception_type", "date"];
        sink.set_schema(schema(&columns, &[]), &columns)?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.calendar_dates);
        }

        for service in &feed.services {
            for (&date, &added) in &service.exceptions {
                let exception_type = if added { "1" } else { "2" };
                sink.push_row(vec![
                    service.id.clone(),
                    exception_type.to_string(),
                    opt_date(Some(date)),
                ]);
            }
        }

        if self.sorted {
            sink.sort_by_prefix(3);
        }
        sink.flush()
    }

    fn write_trips<'a>(
        &self,
        feed: &'a Feed,
        target: &mut WriteTarget,
        collected: &mut Vec<OwnedAttribution<'a>>,
    ) -> Result<()> {
        let mut sink = CsvSink::new(target.start_table(TRIPS_FILE)?);
        let ext = ext_columns(&feed.extra.trips);
        sink.set_schema(
            schema(
                &[
                    "route_id",
                    "service_id",
                    "trip_headsign",
                    "trip_short_name",
                    "direction_id",
                    "block_id",
                    "shape_id",
                    "trip_id",
                    "wheelchair_accessible",
                    "bikes_allowed",
                ],
                &ext,
            ),
            &["route_id", "service_id", "trip_id"],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.trips);
        }

        for trip in &feed.trips {
            for attribution in &trip.attributions {
                collected.push(OwnedAttribution {
                    attribution,
                    agency_id: None,
                    route_id: None,
                    trip_id: Some(&trip.id),
                });
            }
            let mut row = vec![
                trip.route_id.clone(),
                trip.service_id.clone(),
                sanitize(&trip.headsign),
                sanitize(&trip.short_name),
                opt_u32(trip.direction_id.map(u32::from)),
                trip.block_id.clone(),
                trip.shape_id.clone().unwrap_or_default(),
                trip.id.clone(),
                non_default(trip.wheelchair_accessible, 0),
                non_default(trip.bikes_allowed, 0),
            ];
            push_ext(&mut row, &feed.extra.trips, &ext, &trip.id);
            sink.push_row(row);
        }

        if self.sorted {
            sink.sort_by_prefix(10);
        }
        sink.flush()?;
        debug!("wrote {TRIPS_FILE} ({} trips)", feed.trips.len());
        Ok(())
    }

    fn write_stop_times(&self, feed: &Feed, target: &mut WriteTarget) -> Result<()> {
        let mut sink = CsvSink::new(target.start_table(STOP_TIMES_FILE)?);
        let ext = ext_columns_seq(&feed.extra.stop_times);
        sink.set_schema(
            schema(
                &[
                    "trip_id",
                    "arrival_time",
                    "departure_time",
                    "stop_id",
                    "stop_sequence",
                    "stop_headsign",
                    "pickup_type",
                    "drop_off_type",
                    "continuous_pickup",
                    "continuous_drop_off",
                    "shape_dist_traveled",
                    "timepoint",
                ],
                &ext,
            ),
            &[
                "trip_id",
                "arrival_time",
                "departure_time",
                "stop_id",
                "stop_sequence",
            ],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.stop_times);
        }

        let mut trips: Vec<&Trip> = feed.trips.iter().collect();

        // Pass 1: usage discovery, rows discarded immediately.
        let mut rows = 0usize;
        for trip in &trips {
            for stop_time in &trip.stop_times {
                let mut row = stop_time_row(trip, stop_time);
                row.extend(ext.iter().map(|_| "-".to_string()));
                sink.record_usage(&row);
                rows += 1;
            }
        }

        // Sorting happens at trip granularity only; stop order within a
        // trip is always the original sequence order.
        if self.sorted {
            trips.sort_by(|a, b| a.id.cmp(&b.id));
        }
        sink.write_header()?;

        // Pass 2: identical traversal, immediate emission.
        for trip in &trips {
            for stop_time in &trip.stop_times {
                let mut row = stop_time_row(trip, stop_time);
                for name in &ext {
                    row.push(ext_seq_value(
                        &feed.extra.stop_times,
                        name,
                        &trip.id,
                        stop_time.sequence,
                    ));
                }
                sink.write_raw(row)?;
            }
        }
        sink.flush()?;
        debug!("wrote {STOP_TIMES_FILE} ({rows} stop times)");
        Ok(())
    }

    fn write_fare_attributes(&self, feed: &Feed, target: &mut WriteTarget) -> Result<()> {
        if feed.fare_attributes.is_empty() {
            return target.remove_stale(FARE_ATTRIBUTES_FILE);
        }
        let mut sink = CsvSink::new(target.start_table(FARE_ATTRIBUTES_FILE)?);
        let ext = ext_columns(&feed.extra.fare_attributes);
        sink.set_schema(
            schema(
                &[
                    "fare_id",
                    "price",
                    "currency_type",
                    "payment_method",
                    "transfers",
                    "transfer_duration",
                    "agency_id",
                ],
                &ext,
            ),
            &["fare_id", "price", "currency_type", "payment_method", "transfers"],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.fare_attributes);
        }

        for fare in &feed.fare_attributes {
            let mut row = vec![
                fare.id.clone(),
                fare.price.clone(),
                fare.currency.clone(),
                fare.payment_method.to_string(),
                opt_u32(fare.transfers),
                opt_u32(fare.transfer_duration),
                fare.agency_id.clone().unwrap_or_default(),
            ];
            push_ext(&mut row, &feed.extra.fare_attributes, &ext, &fare.id);
            sink.push_row(row);
        }

        if self.sorted {
            sink.sort_by_prefix(1);
        }
        sink.flush()
    }

    fn write_fare_rules(&self, feed: &Feed, target: &mut WriteTarget) -> Result<()> {
        if feed.fare_attributes.iter().all(|f| f.rules.is_empty()) {
            return target.remove_stale(FARE_RULES_FILE);
        }
        let mut sink = CsvSink::new(target.start_table(FARE_RULES_FILE)?);
        let ext = ext_columns(&feed.extra.fare_rules);
        sink.set_schema(
            schema(
                &["fare_id", "route_id", "origin_id", "destination_id", "contains_id"],
                &ext,
            ),
            &["fare_id"],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.fare_rules);
        }

        for fare in &feed.fare_attributes {
            for rule in &fare.rules {
                let mut row = vec![
                    fare.id.clone(),
                    rule.route_id.clone().unwrap_or_default(),
                    rule.origin_id.clone(),
                    rule.destination_id.clone(),
                    rule.contains_id.clone(),
                ];
                push_ext(&mut row, &feed.extra.fare_rules, &ext, &fare.id);
                sink.push_row(row);
            }
        }

        if self.sorted {
            sink.sort_by_prefix(5);
        }
        sink.flush()
    }

    fn write_frequencies(&self, feed: &Feed, target: &mut WriteTarget) -> Result<()> {
        if feed.trips.iter().all(|t| t.frequencies.is_empty()) {
            return target.remove_stale(FREQUENCIES_FILE);
        }
        let mut sink = CsvSink::new(target.start_table(FREQUENCIES_FILE)?);
        let ext = ext_columns(&feed.extra.frequencies);
        sink.set_schema(
            schema(
                &["trip_id", "start_time", "end_time", "headway_secs", "exact_times"],
                &ext,
            ),
            &["trip_id", "start_time", "end_time", "headway_secs"],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.frequencies);
        }

        for trip in &feed.trips {
            for frequency in &trip.frequencies {
                let mut row = vec![
                    trip.id.clone(),
                    crate::encode::time(frequency.start_time),
                    crate::encode::time(frequency.end_time),
                    frequency.headway_secs.to_string(),
                    gtfs_bool(frequency.exact_times, false),
                ];
                push_ext(&mut row, &feed.extra.frequencies, &ext, &trip.id);
                sink.push_row(row);
            }
        }

        if self.sorted {
            sink.sort_by_prefix(5);
        }
        sink.flush()
    }

    fn write_transfers(&self, feed: &Feed, target: &mut WriteTarget) -> Result<()> {
        if feed.transfers.is_empty() {
            return target.remove_stale(TRANSFERS_FILE);
        }
        let mut sink = CsvSink::new(target.start_table(TRANSFERS_FILE)?);
        let ext = ext_columns(&feed.extra.transfers);
        sink.set_schema(
            schema(
                &["from_stop_id", "to_stop_id", "transfer_type", "min_transfer_time"],
                &ext,
            ),
            &["from_stop_id", "to_stop_id", "transfer_type"],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.transfers);
        }

        // Transfers carry no id, so duplicates would go unnoticed upstream.
        let mut seen = HashSet::new();
        for transfer in &feed.transfers {
            if !seen.insert(transfer) {
                continue;
            }
            let key = format!("{}|{}", transfer.from_stop_id, transfer.to_stop_id);
            let mut row = vec![
                transfer.from_stop_id.clone(),
                transfer.to_stop_id.clone(),
                non_default(transfer.transfer_type, 0),
                opt_u32(transfer.min_transfer_time),
            ];
            push_ext(&mut row, &feed.extra.transfers, &ext, &key);
            sink.push_row(row);
        }

        if self.sorted {
            sink.sort_by_prefix(4);
        }
        sink.flush()
    }

    fn write_levels(&self, feed: &Feed, target: &mut WriteTarget) -> Result<()> {
        if feed.levels.is_empty() {
            return target.remove_stale(LEVELS_FILE);
        }
        let mut sink = CsvSink::new(target.start_table(LEVELS_FILE)?);
        let ext = ext_columns(&feed.extra.levels);
        sink.set_schema(
            schema(&["level_id", "level_index", "level_name"], &ext),
            &["level_id", "level_index"],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.levels);
        }

        for level in &feed.levels {
            let mut row = vec![
                level.id.clone(),
                level.index.to_string(),
                level.name.clone(),
            ];
            push_ext(&mut row, &feed.extra.levels, &ext, &level.id);
            sink.push_row(row);
        }

        if self.sorted {
            sink.sort_by_prefix(1);
        }
        sink.flush()
    }

    fn write_pathways(&self, feed: &Feed, target: &mut WriteTarget) -> Result<()> {
        if feed.pathways.is_empty() {
            return target.remove_stale(PATHWAYS_FILE);
        }
        let mut sink = CsvSink::new(target.start_table(PATHWAYS_FILE)?);
        let ext = ext_columns(&feed.extra.pathways);
        sink.set_schema(
            schema(
                &[
                    "pathway_id",
                    "from_stop_id",
                    "to_stop_id",
                    "pathway_mode",
                    "is_bidirectional",
                    "length",
                    "traversal_time",
                    "stair_count",
                    "max_slope",
                    "min_width",
                    "signposted_as",
                    "reversed_signposted_as",
                ],
                &ext,
            ),
            &[
                "pathway_id",
                "from_stop_id",
                "to_stop_id",
                "pathway_mode",
                "is_bidirectional",
            ],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.pathways);
        }

        for pathway in &feed.pathways {
            let mut row = vec![
                pathway.id.clone(),
                pathway.from_stop_id.clone(),
                pathway.to_stop_id.clone(),
                pathway.mode.to_string(),
                gtfs_bool(pathway.is_bidirectional, true),
                opt_f32(pathway.length),
                opt_u32(pathway.traversal_time),
                nonzero_i32(pathway.stair_count),
                nonzero_f32(pathway.max_slope),
                opt_f32(pathway.min_width),
                pathway.signposted_as.clone(),
                pathway.reversed_signposted_as.clone(),
            ];
            push_ext(&mut row, &feed.extra.pathways, &ext, &pathway.id);
            sink.push_row(row);
        }

        if self.sorted {
            sink.sort_by_prefix(1);
        }
        sink.flush()
    }

    fn write_attributions(
        &self,
        feed: &Feed,
        target: &mut WriteTarget,
        collected: &[OwnedAttribution],
    ) -> Result<()> {
        if feed.attributions.is_empty() && collected.is_empty() {
            return target.remove_stale(ATTRIBUTIONS_FILE);
        }
        let mut sink = CsvSink::new(target.start_table(ATTRIBUTIONS_FILE)?);
        let ext = ext_columns(&feed.extra.attributions);
        sink.set_schema(
            schema(
                &[
                    "attribution_id",
                    "agency_id",
                    "route_id",
                    "trip_id",
                    "organization_name",
                    "is_producer",
                    "is_operator",
                    "is_authority",
                    "attribution_url",
                    "attribution_email",
                    "attribution_phone",
                ],
                &ext,
            ),
            &["organization_name"],
        )?;
        if self.keep_col_order {
            sink.set_order(&feed.column_orders.attributions);
        }

        for attribution in &feed.attributions {
            let mut row = attribution_row(attribution, None, None, None);
            push_ext(&mut row, &feed.extra.attributions, &ext, &attribution.id);
            sink.push_row(row);
        }
        for owned in collected {
            let mut row = attribution_row(
                owned.attribution,
                owned.agency_id,
                owned.route_id,
                owned.trip_id,
            );
            push_ext(&mut row, &feed.extra.attributions, &ext, &owned.attribution.id);
            sink.push_row(row);
        }

        if self.sorted {
            sink.sort_by_prefix(1);
        }
        sink.flush()
    }
}

fn attribution_row(
    attribution: &Attribution,
    agency_id: Option<&str>,
    route_id: Option<&str>,
    trip_id: Option<&str>,
) -> Vec<String> {
    vec![
        attribution.id.clone(),
        agency_id.unwrap_or_default().to_string(),
        route_id.unwrap_or_default().to_string(),
        trip_id.unwrap_or_default().to_string(),
        sanitize(&attribution.organization_name),
        gtfs_bool(attribution.is_producer, false),
        gtfs_bool(attribution.is_operator, false),
        gtfs_bool(attribution.is_authority, false),
        attribution.url.clone().unwrap_or_default(),
        attribution.email.clone().unwrap_or_default(),
        attribution.phone.clone(),
    ]
}

fn shape_point_row(shape: &Shape, point: &ShapePoint) -> Vec<String> {
    vec![
        shape.id.clone(),
        point.sequence.to_string(),
        point.lat.to_string(),
        point.lon.to_string(),
        opt_f32(point.dist_traveled),
    ]
}

fn stop_time_row(trip: &Trip, stop_time: &StopTime) -> Vec<String> {
    // Untimed stops leave the timepoint cell empty as well; an approximate
    // timepoint is only meaningful when times are present.
    let (arrival, departure, timepoint) = match (stop_time.arrival, stop_time.departure) {
        (Some(arrival), Some(departure)) => (
            crate::encode::time(arrival),
            crate::encode::time(departure),
            if stop_time.timepoint {
                String::new()
            } else {
                "0".to_string()
            },
        ),
        _ => (String::new(), String::new(), String::new()),
    };
    vec![
        trip.id.clone(),
        arrival,
        departure,
        stop_time.stop_id.clone(),
        stop_time.sequence.to_string(),
        sanitize(&stop_time.headsign),
        non_default(stop_time.pickup_type, 0),
        non_default(stop_time.drop_off_type, 0),
        non_default(stop_time.continuous_pickup, 1),
        non_default(stop_time.continuous_drop_off, 1),
        opt_f32(stop_time.shape_dist_traveled),
        timepoint,
    ]
}

fn schema(fixed: &[&str], ext: &[String]) -> Vec<String> {
    fixed
        .iter()
        .map(|c| c.to_string())
        .chain(ext.iter().cloned())
        .collect()
}

fn ext_columns(map: &ExtMap) -> Vec<String> {
    map.keys().cloned().collect()
}

fn ext_columns_seq(map: &ExtSeqMap) -> Vec<String> {
    map.keys().cloned().collect()
}

fn push_ext(row: &mut Vec<String>, map: &ExtMap, columns: &[String], id: &str) {
    for name in columns {
        let value = map
            .get(name)
            .and_then(|values| values.get(id))
            .cloned()
            .unwrap_or_default();
        row.push(value);
    }
}

fn ext_seq_value(map: &ExtSeqMap, column: &str, parent_id: &str, sequence: u32) -> String {
    map.get(column)
        .and_then(|values| values.get(&(parent_id.to_string(), sequence)))
        .cloned()
        .unwrap_or_default()
}

fn non_default(v: u8, default: u8) -> String {
    if v == default {
        String::new()
    } else {
        v.to_string()
    }
}
