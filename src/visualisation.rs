use colorgrad::Gradient;
use ndarray::Array2;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::fields::FieldSnapshot;

// Fixed display ranges for the false-colour panels; values outside saturate.
const AMPLITUDE_RANGE: (f64, f64) = (-5.0, 5.0);
const COUPLING_RANGE: (f64, f64) = (0.0, 100.0);

pub struct FieldVisualiser {
    output_dir: String,
    width: u32,
    height: u32,
    matter_gradient: Box<dyn Gradient>,
    antimatter_gradient: Box<dyn Gradient>,
    coupling_gradient: Box<dyn Gradient>,
}

impl FieldVisualiser {
    pub fn new(output_dir: &str, width: u32, height: u32) -> std::io::Result<Self> {
        std::fs::create_dir_all(output_dir)?;

        Ok(Self {
            output_dir: output_dir.to_string(),
            width,
            height,
            matter_gradient: Box::new(colorgrad::preset::reds()),
            antimatter_gradient: Box::new(colorgrad::preset::blues()),
            coupling_gradient: Box::new(colorgrad::preset::plasma()),
        })
    }

    pub fn output_dir(&self) -> &str {
        &self.output_dir
    }

    /// Render one snapshot as a three-panel PNG: matter, antimatter and the
    /// nonlinearity field side by side.
    pub fn plot_frame(&self, frame: &FieldSnapshot) -> Result<(), Box<dyn std::error::Error>> {
        let filename = format!("{}/fields_{:06}.png", self.output_dir, frame.step);
        let root = BitMapBackend::new(&filename, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let panels = root.split_evenly((1, 3));
        self.draw_panel(
            &panels[0],
            &frame.matter,
            "Matter breathing field",
            AMPLITUDE_RANGE,
            self.matter_gradient.as_ref(),
            frame.time,
        )?;
        self.draw_panel(
            &panels[1],
            &frame.antimatter,
            "Antimatter breathing field",
            AMPLITUDE_RANGE,
            self.antimatter_gradient.as_ref(),
            frame.time,
        )?;
        self.draw_panel(
            &panels[2],
            &frame.coupling,
            "Nonlinearity field",
            COUPLING_RANGE,
            self.coupling_gradient.as_ref(),
            frame.time,
        )?;

        root.present()?;
        Ok(())
    }

    fn draw_panel(
        &self,
        area: &DrawingArea<BitMapBackend, Shift>,
        data: &Array2<f64>,
        title: &str,
        (min_val, max_val): (f64, f64),
        gradient: &dyn Gradient,
        time: f64,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (nx, ny) = data.dim();

        let caption = format!("{} (t={:.2})", title, time);
        let mut chart = ChartBuilder::on(area)
            .caption(&caption, ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(0..nx, 0..ny)?;

        chart
            .configure_mesh()
            .x_desc("x (grid points)")
            .y_desc("y (grid points)")
            .draw()?;

        for i in 0..nx {
            for j in 0..ny {
                let color = Self::value_to_colour(gradient, data[[i, j]], min_val, max_val);
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(i, j), (i + 1, j + 1)],
                    color.filled(),
                )))?;
            }
        }

        Ok(())
    }

    fn value_to_colour(gradient: &dyn Gradient, value: f64, min_val: f64, max_val: f64) -> RGBColor {
        let normalized = ((value - min_val) / (max_val - min_val)).clamp(0.0, 1.0);
        let rgba = gradient.at(normalized as f32).to_rgba8();
        RGBColor(rgba[0], rgba[1], rgba[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(c: RGBColor) -> (u8, u8, u8) {
        (c.0, c.1, c.2)
    }

    #[test]
    fn test_colour_saturates_outside_display_range() {
        let gradient = colorgrad::preset::reds();
        let below = FieldVisualiser::value_to_colour(&gradient, -10.0, -5.0, 5.0);
        let at_min = FieldVisualiser::value_to_colour(&gradient, -5.0, -5.0, 5.0);
        let above = FieldVisualiser::value_to_colour(&gradient, 12.0, -5.0, 5.0);
        let at_max = FieldVisualiser::value_to_colour(&gradient, 5.0, -5.0, 5.0);

        assert_eq!(rgb(below), rgb(at_min));
        assert_eq!(rgb(above), rgb(at_max));
        assert_ne!(rgb(at_min), rgb(at_max));
    }

    #[test]
    fn test_colour_uses_fixed_range_not_data_extent() {
        // The same value maps to the same colour whatever data surrounds it.
        let gradient = colorgrad::preset::plasma();
        let a = FieldVisualiser::value_to_colour(&gradient, 50.0, 0.0, 100.0);
        let b = FieldVisualiser::value_to_colour(&gradient, 50.0, 0.0, 100.0);
        assert_eq!(rgb(a), rgb(b));
    }
}
