//! Validation of 6-field cron expressions before they reach the scheduler.

use anyhow::{anyhow, Result};

pub fn validate_6_field_cron(schedule: &str) -> Result<()> {
    let parts: Vec<&str> = schedule.split_whitespace().collect();

    if parts.len() != 6 {
        return Err(anyhow!(
            "expected 6 fields (second minute hour day month dayofweek), got {}: '{}'",
            parts.len(),
            schedule
        ));
    }

    const FIELDS: [(&str, u32, u32); 6] = [
        ("second", 0, 59),
        ("minute", 0, 59),
        ("hour", 0, 23),
        ("day", 1, 31),
        ("month", 1, 12),
        ("dayofweek", 0, 7),
    ];

    for (part, (name, min, max)) in parts.iter().zip(FIELDS) {
        validate_field(part, name, min, max)?;
    }
    Ok(())
}

fn validate_field(field: &str, name: &str, min: u32, max: u32) -> Result<()> {
    if field == "*" || field == "?" {
        return Ok(());
    }

    if let Some(step) = field.strip_prefix("*/") {
        let step = parse(step, name)?;
        if step == 0 {
            return Err(anyhow!("{} step value cannot be 0", name));
        }
        return Ok(());
    }

    for part in field.split(',') {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse(start, name)?;
                let end = parse(end, name)?;
                check_range(start, name, min, max)?;
                check_range(end, name, min, max)?;
                if start > end {
                    return Err(anyhow!("{} range {}-{} is reversed", name, start, end));
                }
            }
            None => check_range(parse(part, name)?, name, min, max)?,
        }
    }
    Ok(())
}

fn parse(value: &str, name: &str) -> Result<u32> {
    value
        .parse::<u32>()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, value))
}

fn check_range(value: u32, name: &str, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        return Err(anyhow!(
            "{} value {} is outside valid range {}-{}",
            name,
            value,
            min,
            max
        ));
    }
    Ok(())
}
