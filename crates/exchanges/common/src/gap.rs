use candlefeed_core::model::{Candlestick, Interval};
use candlefeed_core::time::normalize;
use chrono::{DateTime, Utc};

/// Fill holes in a fetched page by forward-cloning, so every entry lands on
/// `start_ts + k*interval` for increasing `k` with no omission (§4.2).
///
/// `start_ts` is first normalized forward to the next interval boundary.
/// Candles older than that are dropped; a first candle in the future is
/// cloned backward to cover it; any gap between consecutive candles wider
/// than one step is filled by cloning the earlier one forward, except the
/// slot immediately adjacent to the later candle, which clones the later
/// one backward instead. A candle already on the expected slot passes
/// through unchanged. Idempotent: `patch(patch(p, s, d), s, d) == patch(p, s, d)`.
pub fn patch(candles: Vec<Candlestick>, start_instant: DateTime<Utc>, interval: Interval) -> Vec<Candlestick> {
    let start_ts = normalize(start_instant, interval, false);
    patch_from_ts(candles, start_ts, interval)
}

/// As `patch`, but takes an already-normalized starting timestamp directly —
/// useful when the caller (the gap patcher's own idempotence test, or an
/// adapter that normalized earlier) already has `start_ts` in hand.
pub fn patch_from_ts(candles: Vec<Candlestick>, start_ts: i64, interval: Interval) -> Vec<Candlestick> {
    if candles.is_empty() {
        return Vec::new();
    }
    let step = interval.as_secs();

    let retained: Vec<Candlestick> = candles
        .into_iter()
        .filter(|c| c.timestamp_secs >= start_ts)
        .collect();
    if retained.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(retained.len());
    let mut expected = start_ts;

    let first = retained[0];
    while expected < first.timestamp_secs {
        out.push(first.cloned_at(expected));
        expected += step;
    }

    for candle in retained {
        if candle.timestamp_secs == expected {
            out.push(candle);
            expected += step;
            continue;
        }
        debug_assert!(candle.timestamp_secs > expected);
        let earlier_filler = out.last().copied().unwrap_or(candle);
        while expected < candle.timestamp_secs {
            if expected + step == candle.timestamp_secs {
                // Slot adjacent to the later candle clones it backward
                // rather than continuing the earlier candle's forward clone
                // (§8 scenario 3: t:300 is a clone of t:360, not t:180).
                out.push(candle.cloned_at(expected));
            } else {
                out.push(earlier_filler.cloned_at(expected));
            }
            expected += step;
        }
        out.push(candle);
        expected += step;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn candle(ts: i64, v: i64) -> Candlestick {
        Candlestick::try_new(
            ts,
            Decimal::new(v, 0),
            Decimal::new(v, 0),
            Decimal::new(v, 0),
            Decimal::new(v, 0),
        )
        .unwrap()
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(patch_from_ts(vec![], 0, Interval::ONE_MINUTE), vec![]);
    }

    #[test]
    fn patches_leading_hole_and_inner_gap_per_spec_example() {
        // input [{t:180},{t:360}], start_ts=120, dur=60
        // -> [{t:120 clone of 180},{t:180},{t:240 clone of 180},{t:300 clone of 360},{t:360}]
        let interval = Interval::from_secs(60).unwrap();
        let input = vec![candle(180, 2), candle(360, 4)];
        let out = patch_from_ts(input, 120, interval);

        let timestamps: Vec<i64> = out.iter().map(|c| c.timestamp_secs).collect();
        assert_eq!(timestamps, vec![120, 180, 240, 300, 360]);

        assert_eq!(out[0].open, Decimal::new(2, 0)); // clone of t:180
        assert_eq!(out[1].open, Decimal::new(2, 0)); // original t:180
        assert_eq!(out[2].open, Decimal::new(2, 0)); // clone of t:180
        assert_eq!(out[3].open, Decimal::new(4, 0)); // clone of t:360
        assert_eq!(out[4].open, Decimal::new(4, 0)); // original t:360
    }

    #[test]
    fn drops_candles_older_than_start() {
        let interval = Interval::ONE_MINUTE;
        let input = vec![candle(0, 1), candle(60, 2), candle(120, 3)];
        let out = patch_from_ts(input, 60, interval);
        let timestamps: Vec<i64> = out.iter().map(|c| c.timestamp_secs).collect();
        assert_eq!(timestamps, vec![60, 120]);
    }

    #[test]
    fn pass_through_unchanged_when_already_aligned() {
        let interval = Interval::ONE_MINUTE;
        let input = vec![candle(60, 1), candle(120, 2)];
        let out = patch_from_ts(input.clone(), 60, interval);
        assert_eq!(out, input);
    }

    #[test]
    fn idempotent() {
        let interval = Interval::from_secs(60).unwrap();
        let input = vec![candle(180, 2), candle(360, 4)];
        let once = patch_from_ts(input, 120, interval);
        let twice = patch_from_ts(once.clone(), 120, interval);
        assert_eq!(once, twice);
    }
}
