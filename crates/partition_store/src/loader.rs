use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::warn;

use crate::LoaderConfig;
use ratings_partition_core::{PartitionError, PartitionResult, RatingRow};

/// Parses one source line. Blank and short lines yield `Ok(None)`.
pub fn parse_line(
    line: &str,
    line_no: usize,
    config: &LoaderConfig,
) -> PartitionResult<Option<RatingRow>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split(config.delimiter.as_str()).collect();
    if fields.len() < config.min_fields() {
        warn!(
            "skipping line {line_no}: expected at least {} fields, found {}",
            config.min_fields(),
            fields.len()
        );
        return Ok(None);
    }
    let user_id = parse_field::<i64>(fields[config.user_field], "user_id", line_no)?;
    let item_id = parse_field::<i64>(fields[config.item_field], "item_id", line_no)?;
    let rating = parse_field::<f64>(fields[config.rating_field], "rating", line_no)?;
    RatingRow::new(user_id, item_id, rating).validated().map(Some)
}

fn parse_field<T: std::str::FromStr>(raw: &str, name: &str, line_no: usize) -> PartitionResult<T> {
    raw.trim().parse().map_err(|_| {
        PartitionError::invalid(format!("line {line_no}: invalid {name} '{}'", raw.trim()))
    })
}

/// Streams rating rows out of a delimited source.
pub struct RatingsReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    config: LoaderConfig,
}

impl<R: BufRead> RatingsReader<R> {
    pub fn new(reader: R, config: LoaderConfig) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            config,
        }
    }

    /// Pulls up to `limit` rows; an empty batch means the source is drained.
    pub fn next_batch(&mut self, limit: usize) -> PartitionResult<Vec<RatingRow>> {
        let mut batch = Vec::with_capacity(limit.min(1024));
        while batch.len() < limit {
            match self.next() {
                Some(row) => batch.push(row?),
                None => break,
            }
        }
        Ok(batch)
    }
}

impl RatingsReader<BufReader<File>> {
    pub fn open(path: &Path, config: LoaderConfig) -> PartitionResult<Self> {
        let file = File::open(path).map_err(|err| {
            PartitionError::invalid(format!("open ratings file {}: {err}", path.display()))
        })?;
        Ok(Self::new(BufReader::new(file), config))
    }
}

impl<R: BufRead> Iterator for RatingsReader<R> {
    type Item = PartitionResult<RatingRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => {
                    return Some(Err(PartitionError::storage(format!(
                        "read ratings line {}: {err}",
                        self.line_no + 1
                    ))));
                }
            };
            self.line_no += 1;
            match parse_line(&line, self.line_no, &self.config) {
                Ok(Some(row)) => return Some(Ok(row)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
