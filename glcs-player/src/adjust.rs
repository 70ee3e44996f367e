//! Parses `-r/--resize` and `-g/--color`. Validation mirrors the
//! source's `sscanf` checks; applying either adjustment is a
//! [`glcs_core::collaborators::ColorFilter`]/scaler job with no
//! production implementation here, so these are parsed and logged,
//! not applied.

use anyhow::{bail, Context};

#[derive(Debug, Clone, Copy)]
pub enum Resize {
    Absolute { width: u32, height: u32 },
    Factor(f64),
}

pub fn parse_resize(s: &str) -> anyhow::Result<Resize> {
    if let Some((w, h)) = s.split_once('x') {
        let width: u32 = w.parse().context("resize width")?;
        let height: u32 = h.parse().context("resize height")?;
        if width == 0 || height == 0 {
            bail!("resize dimensions must be non-zero");
        }
        Ok(Resize::Absolute { width, height })
    } else {
        let factor: f64 = s.parse().context("resize factor")?;
        if factor <= 0.0 {
            bail!("resize factor must be positive");
        }
        Ok(Resize::Factor(factor))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAdjust {
    pub brightness: f32,
    pub contrast: f32,
    pub red_gamma: f32,
    pub green_gamma: f32,
    pub blue_gamma: f32,
}

pub fn parse_color(s: &str) -> anyhow::Result<ColorAdjust> {
    let parts: Vec<&str> = s.split(';').collect();
    if parts.len() != 5 {
        bail!("color adjust expects 5 ';'-separated values, got {}", parts.len());
    }
    let mut values = [0f32; 5];
    for (v, p) in values.iter_mut().zip(parts.iter()) {
        *v = p.parse().with_context(|| format!("invalid color component {p:?}"))?;
    }
    Ok(ColorAdjust {
        brightness: values[0],
        contrast: values[1],
        red_gamma: values[2],
        green_gamma: values[3],
        blue_gamma: values[4],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_parses_wxh() {
        let r = parse_resize("1280x720").unwrap();
        assert!(matches!(r, Resize::Absolute { width: 1280, height: 720 }));
    }

    #[test]
    fn resize_parses_factor() {
        let r = parse_resize("0.5").unwrap();
        assert!(matches!(r, Resize::Factor(f) if f == 0.5));
    }

    #[test]
    fn resize_rejects_zero_factor() {
        assert!(parse_resize("0").is_err());
    }

    #[test]
    fn color_parses_five_fields() {
        let c = parse_color("0.1;1.2;1.0;1.0;1.0").unwrap();
        assert_eq!(c.brightness, 0.1);
        assert_eq!(c.blue_gamma, 1.0);
    }

    #[test]
    fn color_rejects_wrong_field_count() {
        assert!(parse_color("1;2;3").is_err());
    }
}
