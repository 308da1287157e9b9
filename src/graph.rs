#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]
use crate::analytics::{MemberCheckIns, MonthlyCount, PaymentStatus};
use crate::error::{GymError, Result};
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use plotters::prelude::*;
use std::io::Cursor;

const BACKGROUND: RGBColor = RGBColor(0x1e, 0x1e, 0x1e);
const PAID_IN_FULL: RGBColor = RGBColor(0x4c, 0xaf, 0x50);
const PARTIAL: RGBColor = RGBColor(0xff, 0xa5, 0x00);
const BAR: RGBColor = RGBColor(0xff, 0xd7, 0x00);

/// Charts offered on the analytics page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartKind {
    /// New memberships per start month
    Subscriptions,

    /// Members with the most check-ins
    CheckIns,

    /// Paid in full against partial payment
    Payments,
}

impl ChartKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "subscriptions" => Some(ChartKind::Subscriptions),
            "checkins" => Some(ChartKind::CheckIns),
            "payments" => Some(ChartKind::Payments),
            _ => None,
        }
    }
}

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "Chart".to_string(),
            y_label: "Count".to_string(),
            width: 800,
            height: 500,
        }
    }
}

pub fn subscriptions_chart(months: &[MonthlyCount]) -> Result<Vec<u8>> {
    let bars: Vec<(String, f64, RGBColor)> = months
        .iter()
        .map(|m| (m.month.clone(), m.count as f64, BAR))
        .collect();
    let options = ChartOptions {
        title: "New Memberships by Month".to_string(),
        ..ChartOptions::default()
    };
    bar_chart(&bars, &options)
}

pub fn check_ins_chart(top: &[MemberCheckIns]) -> Result<Vec<u8>> {
    let bars: Vec<(String, f64, RGBColor)> = top
        .iter()
        .map(|m| (m.key.clone(), f64::from(m.check_in_count), BAR))
        .collect();
    let options = ChartOptions {
        title: "Top Members by Check-ins".to_string(),
        y_label: "Check-ins".to_string(),
        ..ChartOptions::default()
    };
    bar_chart(&bars, &options)
}

pub fn payments_chart(status: &PaymentStatus) -> Result<Vec<u8>> {
    let bars = vec![
        ("Paid in Full".to_string(), status.paid_in_full as f64, PAID_IN_FULL),
        ("Partial Payment".to_string(), status.partial as f64, PARTIAL),
    ];
    let options = ChartOptions {
        title: "Payment Status Distribution".to_string(),
        y_label: "Members".to_string(),
        ..ChartOptions::default()
    };
    bar_chart(&bars, &options)
}

/// Draws one labelled bar per entry and returns the chart as PNG bytes.
///
/// Drawing happens into an in-memory RGB buffer, so nothing touches the
/// filesystem.
pub fn bar_chart(bars: &[(String, f64, RGBColor)], options: &ChartOptions) -> Result<Vec<u8>> {
    let mut pixels = vec![0u8; (options.width * options.height * 3) as usize];
    draw_bars(&mut pixels, bars, options).map_err(|e| GymError::Chart(e.to_string()))?;

    let img = RgbImage::from_raw(options.width, options.height, pixels)
        .ok_or_else(|| GymError::Chart("pixel buffer size mismatch".to_string()))?;
    let mut png = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| GymError::Chart(e.to_string()))?;
    Ok(png)
}

fn draw_bars(
    pixels: &mut [u8],
    bars: &[(String, f64, RGBColor)],
    options: &ChartOptions,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::with_buffer(pixels, (options.width, options.height))
        .into_drawing_area();
    root.fill(&BACKGROUND)?;

    let max_y = bars.iter().map(|(_, y, _)| *y).fold(0.0, f64::max);
    let y_range = 0.0..(max_y * 1.1).max(1.0);
    let labels: Vec<String> = bars.iter().map(|(label, _, _)| label.clone()).collect();

    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 30).into_font().color(&WHITE))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((0..bars.len() as u32).into_segmented(), y_range)?;

    let format_label = |v: &SegmentValue<u32>| match v {
        SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
        _ => String::new(),
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .bold_line_style(WHITE.mix(0.2))
        .light_line_style(TRANSPARENT)
        .axis_style(WHITE)
        .label_style(("sans-serif", 14).into_font().color(&WHITE))
        .axis_desc_style(("sans-serif", 16).into_font().color(&WHITE))
        .x_labels(bars.len().max(1))
        .x_label_formatter(&format_label)
        .y_desc(&options.y_label)
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, (_, y, color))| {
        let i = i as u32;
        let mut bar = Rectangle::new(
            [
                (SegmentValue::Exact(i), 0.0),
                (SegmentValue::Exact(i + 1), *y),
            ],
            color.filled(),
        );
        bar.set_margin(0, 0, 8, 8);
        bar
    }))?;

    root.present()?;
    Ok(())
}
