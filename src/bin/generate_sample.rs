use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use capres_analyzer::analysis::regression::forward_resistance;

/// Ground truth used for the synthetic CTLM family.
const SHEET_RESISTANCE: f64 = 50.0; // Ω/□
const TRANSFER_LENGTH: f64 = 2.0; // µm
const CONTACT_LENGTH: f64 = 100.0; // µm
const SPACINGS: [f64; 5] = [5.0, 10.0, 15.0, 20.0, 25.0];

const IV_POINTS: usize = 41;
const CV_POINTS: usize = 101;
const CV_FREQUENCIES: [f64; 3] = [1e3, 1e4, 1e5];

/// Seeded Gaussian noise for the synthetic instrument readings, so that
/// repeated runs write byte-identical exports.
///
/// Uniform draws come from splitmix64; Box-Muller turns them into normal
/// deviates.  Only the zero-mean case is ever needed.
struct InstrumentNoise {
    state: u64,
}

impl InstrumentNoise {
    fn seeded(seed: u64) -> Self {
        InstrumentNoise { state: seed }
    }

    fn uniform(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^= z >> 31;
        (z >> 11) as f64 / (1u64 << 53) as f64
    }

    /// One reading error with standard deviation `sigma`.
    fn sample(&mut self, sigma: f64) -> f64 {
        let u1 = self.uniform().max(f64::MIN_POSITIVE);
        let u2 = self.uniform();
        sigma * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

fn ramp(from: f64, to: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|k| from + (to - from) * k as f64 / (n - 1) as f64)
        .collect()
}

fn setup_header(locus: &str, start: f64, stop: f64, frequencies: &[f64]) -> String {
    let mut s = String::from("SetupTitle,Synthetic CTLM\n");
    s.push_str(&format!("SetupTitle,Measurement.Primary.Locus,,{locus}\n"));
    s.push_str(&format!("SetupTitle,Measurement.Primary.Start,,{start}\n"));
    s.push_str(&format!("SetupTitle,Measurement.Primary.Stop,,{stop}\n"));
    if !frequencies.is_empty() {
        let list: Vec<String> = frequencies.iter().map(|f| f.to_string()).collect();
        s.push_str(&format!(
            "SetupTitle,Measurement.Secondary.Frequency,{}\n",
            list.join(",")
        ));
    }
    s
}

/// One `DataName Vd,Id` block for a resistor of value `r`; current noise
/// is 0.5% of the full-scale reading.
fn iv_block(r: f64, noise: &mut InstrumentNoise) -> String {
    let mut s = String::from("DataName,Vd,Id\n");
    for v in ramp(-0.5, 0.5, IV_POINTS) {
        let i = v / r + noise.sample(0.005 * 0.5 / r);
        s.push_str(&format!("DataValue,{v:.6},{i:.9e}\n"));
    }
    s
}

/// Depletion-like capacitance with a mild frequency roll-off.
fn capacitance(v: f64, f: f64) -> f64 {
    let c0 = 12e-12 / (1.0 + 0.05 * f.log10());
    c0 / (1.0 + (v + 2.5) / 0.8).sqrt()
}

fn write(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let out = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    let per_file = out.join("ctlm_per_spacing");
    fs::create_dir_all(&per_file).with_context(|| format!("creating {}", per_file.display()))?;

    let mut noise = InstrumentNoise::seeded(42);

    // Multi-sweep export: one block per spacing, smallest gap first.
    let mut iv = setup_header("Single", -0.5, 0.5, &[]);
    for &d in &SPACINGS {
        let r = forward_resistance(SHEET_RESISTANCE, TRANSFER_LENGTH, CONTACT_LENGTH, d);
        iv.push_str(&iv_block(r, &mut noise));
        write(
            &per_file.join(format!("{d:02}um.csv")),
            &(setup_header("Single", -0.5, 0.5, &[]) + &iv_block(r, &mut noise)),
        )?;
    }
    write(&out.join("ctlm_iv.csv"), &iv)?;

    // C-V dump: every frequency's sweep concatenated in one block.
    let mut cv = setup_header("Single", -2.0, 2.0, &CV_FREQUENCIES);
    cv.push_str(&format!("TestParameter,Dimension1,{CV_POINTS}\n"));
    cv.push_str("DataName,Vbias,C\n");
    for &f in &CV_FREQUENCIES {
        for v in ramp(-2.0, 2.0, CV_POINTS) {
            let c = capacitance(v, f) * (1.0 + noise.sample(0.002));
            cv.push_str(&format!("DataValue,{v:.4},{c:.6e}\n"));
        }
    }
    write(&out.join("cv_dump.csv"), &cv)?;

    println!(
        "ground truth: Rs={SHEET_RESISTANCE} Ω/□, Lt={TRANSFER_LENGTH} µm, R2={CONTACT_LENGTH} µm"
    );
    Ok(())
}
