use std::collections::HashMap;

use serde::Serialize;

use crate::core::time::display_date;
use crate::core::{date_from, range_to, LoadError, Timestamp, HIGH_DATE};
use crate::index::{sorted_keys, DumpEntry, LookupIndex};
use crate::source::{FormFactor, Row};

/// 一个计费阶梯的一个时间版本
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RateStep {
    pub step: u32,
    /// RUM 区间 `[from, to)`，to 为 i64::MAX 表示不限
    pub from: i64,
    pub to: i64,
    pub beat: i64,
    pub factor: f64,
    pub charge_base: f64,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

impl RateStep {
    pub fn is_valid_at(&self, time: Timestamp) -> bool {
        self.start_time <= time && time <= self.end_time
    }
}

/// 一个阶梯（step）及其按 start_time 升序的全部版本
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RateTier {
    pub step: u32,
    pub versions: Vec<RateStep>,
}

impl RateTier {
    pub fn version_at(&self, time: Timestamp) -> Option<&RateStep> {
        self.versions.iter().find(|v| v.is_valid_at(time))
    }

    /// 前一版本的 end_time = 后一版本 start_time − 1（秒粒度），最新版本延伸到 HIGH_DATE
    fn chain_end_times(&mut self) {
        let starts = self
            .versions
            .iter()
            .skip(1)
            .map(|v| v.start_time - 1)
            .chain(std::iter::once(HIGH_DATE))
            .collect::<Vec<_>>();
        for (v, end) in self.versions.iter_mut().zip(starts) {
            v.end_time = end;
        }
    }
}

/// 阶梯费率表：price model → 按 step 升序的阶梯列表。
///
/// 行格式：`model;step;from;to;beat;factor;chargeBase[;startTime]`
///
/// 本结构只提供阶梯；计费（beat 取整、factor / chargeBase 折算）由调用方完成。
#[derive(Debug, Default)]
pub struct TieredRatePlan {
    models: HashMap<String, Vec<RateTier>>,
}

impl TieredRatePlan {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_price_model(
        &mut self,
        model: &str,
        step: u32,
        from: i64,
        to: i64,
        beat: i64,
        factor: f64,
        charge_base: f64,
        start_time: Timestamp,
    ) -> Result<(), LoadError> {
        if beat <= 0 {
            return Err(LoadError::InvalidBeat(beat));
        }
        if !(charge_base.is_finite() && charge_base > 0.0) {
            return Err(LoadError::InvalidChargeBase(charge_base));
        }
        let to = range_to(to);
        if from > to {
            return Err(LoadError::InvalidRange { from, to });
        }

        let entry = RateStep {
            step,
            from,
            to,
            beat,
            factor,
            charge_base,
            start_time: date_from(start_time),
            end_time: HIGH_DATE,
        };

        let tiers = self.models.entry(model.to_string()).or_default();
        match tiers.binary_search_by_key(&step, |t| t.step) {
            Ok(pos) => {
                let tier = &mut tiers[pos];
                match tier
                    .versions
                    .binary_search_by_key(&entry.start_time, |v| v.start_time)
                {
                    Ok(_) => {
                        return Err(LoadError::DuplicateStepVersion {
                            model: model.to_string(),
                            step,
                            start: entry.start_time,
                        })
                    }
                    Err(at) => tier.versions.insert(at, entry),
                }
                tier.chain_end_times();
            }
            Err(pos) => tiers.insert(
                pos,
                RateTier {
                    step,
                    versions: vec![entry],
                },
            ),
        }
        Ok(())
    }

    /// 按 step 升序的阶梯列表；未知 model 返回空切片
    pub fn price_model(&self, model: &str) -> &[RateTier] {
        self.models.get(model).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 每个阶梯在 `time` 时刻生效的版本；该时刻没有生效版本的阶梯被略去
    pub fn price_model_at(&self, model: &str, time: Timestamp) -> Vec<&RateStep> {
        self.price_model(model)
            .iter()
            .filter_map(|t| t.version_at(time))
            .collect()
    }
}

impl LookupIndex for TieredRatePlan {
    fn form_factor() -> FormFactor {
        FormFactor::between(7, 8)
    }

    fn add_row(&mut self, row: &Row) -> Result<(), LoadError> {
        let step = row.int(1, "step")?;
        let step = u32::try_from(step)
            .ok()
            .filter(|s| *s >= 1)
            .ok_or_else(|| LoadError::InvalidNumber {
                field: "step",
                value: row.text(1).to_string(),
            })?;
        let from = row.int(2, "from")?;
        let to = row.int(3, "to")?;
        let beat = row.int(4, "beat")?;
        let factor = row.float(5, "factor")?;
        let charge_base = row.float(6, "chargeBase")?;
        let start_time = if row.len() > 7 {
            row.date(7, "startTime")?
        } else {
            0
        };
        self.add_price_model(
            row.text(0),
            step,
            from,
            to,
            beat,
            factor,
            charge_base,
            start_time,
        )
    }

    fn clear(&mut self) {
        self.models.clear();
    }

    fn group_count(&self) -> usize {
        self.models.len()
    }

    fn object_count(&self) -> usize {
        self.models
            .values()
            .flat_map(|tiers| tiers.iter())
            .map(|t| t.versions.len())
            .sum()
    }

    fn dump(&self) -> Vec<DumpEntry> {
        let mut out = Vec::new();
        for model in sorted_keys(&self.models) {
            for v in self.models[model].iter().flat_map(|t| t.versions.iter()) {
                out.push(DumpEntry {
                    group: model.clone(),
                    key: format!(
                        "step {} [{},{}) valid [{},{}]",
                        v.step,
                        v.from,
                        v.to,
                        display_date(v.start_time),
                        display_date(v.end_time)
                    ),
                    results: vec![
                        format!("beat={}", v.beat),
                        format!("factor={}", v.factor),
                        format!("chargeBase={}", v.charge_base),
                    ],
                });
            }
        }
        out
    }
}
