use chrono::{Datelike, TimeZone, Utc};
use vindex_types::DateTimeBin;

/// Date-time sorted partition scheme (`spec.md` §4.3): bins a UTC instant
/// (milliseconds since the Unix epoch, matching
/// [`vindex_types::IndexKey::DateTimeUtcMillis`]) by year or by month, and
/// can enumerate the ordered bin sequence covering a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateTimePartitionScheme {
	/// Bin granularity.
	pub bin: DateTimeBin,
}

impl DateTimePartitionScheme {
	/// A scheme with the given bin granularity.
	pub fn new(bin: DateTimeBin) -> Self {
		Self { bin }
	}

	/// Formats the bin key for a UTC instant: `yyyy` for `Year`, `yyyyMM`
	/// for `Month`.
	pub fn partition(&self, millis: i64) -> String {
		let dt = Self::to_datetime(millis);
		match self.bin {
			DateTimeBin::Year => format!("{:04}", dt.year()),
			DateTimeBin::Month => format!("{:04}{:02}", dt.year(), dt.month()),
		}
	}

	/// Returns the ordered bin-key sequence from `floor_bin(start)` to
	/// `floor_bin(end)` inclusive, stepping by one bin (`spec.md` §4.3).
	/// This order is the traversal order sorted-range lookups use.
	///
	/// # Panics
	///
	/// Panics if `start > end`; `spec.md` §4.1 requires `start <= end` for
	/// range queries.
	pub fn partitions_in_range(&self, start: i64, end: i64) -> Vec<String> {
		assert!(start <= end, "range start must not exceed end");
		let mut out = Vec::new();
		let start_dt = Self::to_datetime(start);
		let end_dt = Self::to_datetime(end);
		let (mut year, mut month) = (start_dt.year(), start_dt.month());
		let (end_year, end_month) = (end_dt.year(), end_dt.month());
		loop {
			match self.bin {
				DateTimeBin::Year => out.push(format!("{year:04}")),
				DateTimeBin::Month => out.push(format!("{year:04}{month:02}")),
			}
			let reached_end = match self.bin {
				DateTimeBin::Year => year >= end_year,
				DateTimeBin::Month => year > end_year || (year == end_year && month >= end_month),
			};
			if reached_end {
				break;
			}
			match self.bin {
				DateTimeBin::Year => year += 1,
				DateTimeBin::Month => {
					if month == 12 {
						month = 1;
						year += 1;
					} else {
						month += 1;
					}
				}
			}
		}
		out
	}

	fn to_datetime(millis: i64) -> chrono::DateTime<Utc> {
		Utc.timestamp_millis_opt(millis)
			.single()
			.unwrap_or_else(|| Utc.timestamp_millis_opt(0).single().expect("epoch is valid"))
	}
}

#[cfg(test)]
mod tests {
	use chrono::NaiveDate;

	use super::*;

	fn millis(y: i32, m: u32, d: u32) -> i64 {
		NaiveDate::from_ymd_opt(y, m, d)
			.unwrap()
			.and_hms_opt(0, 0, 0)
			.unwrap()
			.and_utc()
			.timestamp_millis()
	}

	#[test]
	fn year_bin_formats_four_digits() {
		let scheme = DateTimePartitionScheme::new(DateTimeBin::Year);
		assert_eq!(scheme.partition(millis(2023, 6, 1)), "2023");
	}

	#[test]
	fn month_bin_formats_six_digits() {
		let scheme = DateTimePartitionScheme::new(DateTimeBin::Month);
		assert_eq!(scheme.partition(millis(2023, 6, 1)), "202306");
	}

	#[test]
	fn year_range_spans_inclusive_ordered_bins() {
		// spec.md §8 scenario 2: 2021-10-09 .. 2024-10-11 -> ["2021","2022","2023","2024"].
		let scheme = DateTimePartitionScheme::new(DateTimeBin::Year);
		let bins = scheme.partitions_in_range(millis(2021, 10, 9), millis(2024, 10, 11));
		assert_eq!(bins, vec!["2021", "2022", "2023", "2024"]);
	}

	#[test]
	fn month_range_wraps_year_boundary() {
		let scheme = DateTimePartitionScheme::new(DateTimeBin::Month);
		let bins = scheme.partitions_in_range(millis(2023, 11, 15), millis(2024, 2, 1));
		assert_eq!(bins, vec!["202311", "202312", "202401", "202402"]);
	}

	#[test]
	fn single_bin_range_returns_one_entry() {
		let scheme = DateTimePartitionScheme::new(DateTimeBin::Year);
		let bins = scheme.partitions_in_range(millis(2023, 1, 1), millis(2023, 12, 31));
		assert_eq!(bins, vec!["2023"]);
	}
}
