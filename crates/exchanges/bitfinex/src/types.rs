/// Success rows: `[MTS, OPEN, CLOSE, HIGH, LOW, VOLUME]`, ascending when
/// requested with `sort=1`. Error envelope: `["error", code, message]`.
pub type BitfinexCandleRow = Vec<serde_json::Value>;
