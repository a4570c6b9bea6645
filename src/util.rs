use super::rand_xoshiro;
use crate::rand_xoshiro::rand_core::RngCore;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::prelude::*;
use std::time::Instant;

cfg_if::cfg_if! {
    if #[cfg(feature="i32_weight")] {
        /// use i32 to store weight to be compatible with blossom V library (c_int)
        pub type Weight = i32;
    } else {
        pub type Weight = isize;
    }
}

/// index of a node in the decoding graph: real defects first, then their boundary mirrors
pub type NodeIndex = usize;
pub type NodeNum = NodeIndex;

/// the value of a qubit channel or a stabilizer outcome, always `+1` or `-1`
pub type Sign = i8;

/// lattice coordinate `(row, column)`; signed because the virtual boundary rails sit at `-1` and `2 * size + 1`
pub type Position = (isize, isize);

/// a defect (anyon) in spacetime: measurement round `t` and lattice position `(i, j)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Anyon {
    pub t: usize,
    pub i: isize,
    pub j: isize,
}

impl Anyon {
    pub fn new(t: usize, i: isize, j: isize) -> Self {
        Self { t, i, j }
    }

    pub fn position(&self) -> Position {
        (self.i, self.j)
    }
}

/// use Xoshiro256StarStar for deterministic random number generator
pub type DeterministicRng = rand_xoshiro::Xoshiro256StarStar;

pub trait F64Rng {
    /// uniform draw in `[0, 1)`
    fn next_f64(&mut self) -> f64;
}

impl F64Rng for DeterministicRng {
    fn next_f64(&mut self) -> f64 {
        f64::from_bits(0x3FF << 52 | self.next_u64() >> 12) - 1.
    }
}

/// the seed of an individual trial; every trial owns an independent stream so that trials can run in any order
pub fn trial_seed(base_seed: u64, trial_index: usize) -> u64 {
    base_seed.wrapping_add(trial_index as u64)
}

/// record the decoding time of multiple trials
pub struct BenchmarkProfiler {
    /// each record corresponds to a different trial
    pub records: Vec<BenchmarkProfilerEntry>,
    /// summation of all decoding time
    pub sum_round_time: f64,
    /// defect count
    pub sum_defect: usize,
    /// noisy measurement rounds
    pub noisy_measurements: usize,
    /// the file to output the profiler results
    pub benchmark_profiler_output: Option<File>,
}

impl BenchmarkProfiler {
    pub fn new(noisy_measurements: usize, detail_log_file: Option<(String, &serde_json::Value)>) -> std::io::Result<Self> {
        let benchmark_profiler_output = match detail_log_file {
            Some((filename, config)) => {
                let mut file = File::create(filename)?;
                file.write_all(serde_json::to_string(config)?.as_bytes())?;
                file.write_all(b"\n")?;
                file.write_all(
                    serde_json::to_string(&json!({
                        "noisy_measurements": noisy_measurements,
                    }))?
                    .as_bytes(),
                )?;
                file.write_all(b"\n")?;
                Some(file)
            }
            None => None,
        };
        Ok(Self {
            records: vec![],
            sum_round_time: 0.,
            sum_defect: 0,
            noisy_measurements,
            benchmark_profiler_output,
        })
    }

    /// record the beginning of a decoding procedure
    pub fn begin(&mut self) {
        // sanity check last entry, if exists, is complete
        if let Some(last_entry) = self.records.last() {
            assert!(
                last_entry.is_complete(),
                "the last benchmark profiler entry is not complete, make sure to call `begin` and `end` in pairs"
            );
        }
        let mut entry = BenchmarkProfilerEntry::new();
        entry.record_begin();
        self.records.push(entry);
    }

    pub fn event(&mut self, event_name: String) {
        let last_entry = self
            .records
            .last_mut()
            .expect("last entry not exists, call `begin` before `event`");
        last_entry.record_event(event_name);
    }

    /// record the ending of a decoding procedure
    pub fn end(&mut self, defect_num: usize, success: bool) -> std::io::Result<()> {
        let last_entry = self
            .records
            .last_mut()
            .expect("last entry not exists, call `begin` before `end`");
        last_entry.record_end(defect_num);
        let round_time = last_entry.round_time.unwrap_or(0.);
        self.sum_round_time += round_time;
        self.sum_defect += defect_num;
        if let Some(file) = self.benchmark_profiler_output.as_mut() {
            let mut events = serde_json::Map::new();
            for (event_name, time) in last_entry.events.iter() {
                events.insert(event_name.clone(), json!(time));
            }
            let value = json!({
                "round_time": round_time,
                "defect_num": defect_num,
                "success": success,
                "events": events,
            });
            file.write_all(serde_json::to_string(&value)?.as_bytes())?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }

    /// print out a brief one-line statistics
    pub fn brief(&self) -> String {
        let total = self.sum_round_time / (self.records.len() as f64);
        let per_round = total / (1. + self.noisy_measurements as f64);
        let per_defect = self.sum_round_time / (self.sum_defect as f64);
        format!("total: {total:.3e}, round: {per_round:.3e}, defect: {per_defect:.3e},")
    }
}

pub struct BenchmarkProfilerEntry {
    /// the number of defects decoded in this trial, both channels together
    pub defect_num: usize,
    /// the time of beginning a decoding procedure
    begin_time: Option<Instant>,
    /// record additional events
    pub events: Vec<(String, f64)>,
    /// interval between calling [`Self::record_begin`] to calling [`Self::record_end`]
    pub round_time: Option<f64>,
}

impl Default for BenchmarkProfilerEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchmarkProfilerEntry {
    pub fn new() -> Self {
        Self {
            defect_num: 0,
            begin_time: None,
            events: vec![],
            round_time: None,
        }
    }
    /// record the beginning of a decoding procedure
    pub fn record_begin(&mut self) {
        assert_eq!(self.begin_time, None, "do not call `record_begin` twice on the same entry");
        self.begin_time = Some(Instant::now());
    }
    /// record the ending of a decoding procedure
    pub fn record_end(&mut self, defect_num: usize) {
        let begin_time = self
            .begin_time
            .as_ref()
            .expect("make sure to call `record_begin` before calling `record_end`");
        self.round_time = Some(begin_time.elapsed().as_secs_f64());
        self.defect_num = defect_num;
    }
    pub fn record_event(&mut self, event_name: String) {
        let begin_time = self
            .begin_time
            .as_ref()
            .expect("make sure to call `record_begin` before calling `record_event`");
        self.events.push((event_name, begin_time.elapsed().as_secs_f64()));
    }
    pub fn is_complete(&self) -> bool {
        self.round_time.is_some()
    }
}
