use crate::numerical::ShootingBVP::shooting_problem::BVPSolution;
use chrono::Local;
use csv::Writer;
use std::fs::File;
use std::io::{self, Write};

/// dated default filename for saved results
pub fn default_result_name(extension: &str) -> String {
    let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("shooting_result_{}.{}", date_and_time, extension)
}

/// header names y0..y{n-1} for an unnamed state vector
pub fn default_state_headers(n_odes: usize) -> Vec<String> {
    (0..n_odes).map(|i| format!("y{}", i)).collect()
}

/// save a solution into a tab-separated file: one row per grid node,
/// the mesh value first and then the state components
pub fn save_solution_to_file(
    solution: &BVPSolution,
    headers: &Vec<String>,
    filename: &str,
    arg: &String,
) -> io::Result<()> {
    let mut file = File::create(filename)?;
    let mut headers_with_x = Vec::new();
    headers_with_x.push(arg.clone());
    headers_with_x.extend(headers.iter().cloned());
    writeln!(file, "{}", headers_with_x.join("\t"))?;
    for (i, col) in solution.y.column_iter().enumerate() {
        let mut row_data = Vec::new();
        row_data.push(solution.x[i].to_string());
        row_data.extend(col.iter().map(|&val| val.to_string()));
        writeln!(file, "{}", row_data.join("\t"))?;
    }

    Ok(())
}

pub fn save_solution_to_csv(
    solution: &BVPSolution,
    headers: &Vec<String>,
    filename: &str,
    arg: &String,
) -> io::Result<()> {
    let file = File::create(filename)?;
    let mut writer = Writer::from_writer(file);

    let mut headers_with_x = Vec::new();
    headers_with_x.push(arg.clone());
    headers_with_x.extend(headers.iter().cloned());
    writer.write_record(&headers_with_x)?;

    for (i, col) in solution.y.column_iter().enumerate() {
        let mut row_data = Vec::new();
        row_data.push(solution.x[i].to_string());
        row_data.extend(col.iter().map(|&val| val.to_string()));
        writer.write_record(&row_data)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    fn toy_solution() -> BVPSolution {
        let x = DVector::from_vec(vec![0.0, 0.5, 1.0]);
        let y = DMatrix::from_row_slice(2, 3, &[0.0, 0.5, 1.0, 1.0, 1.0, 1.0]);
        BVPSolution::new(x, y, None)
    }

    #[test]
    fn saves_tab_separated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.txt");
        let sol = toy_solution();
        let headers = default_state_headers(2);
        save_solution_to_file(&sol, &headers, path.to_str().unwrap(), &"t".to_string()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "t\ty0\ty1");
        assert_eq!(lines.next().unwrap(), "0\t0\t1");
        assert_eq!(lines.next().unwrap(), "0.5\t0.5\t1");
        assert_eq!(lines.next().unwrap(), "1\t1\t1");
    }

    #[test]
    fn saves_csv_readable_by_the_csv_crate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.csv");
        let sol = toy_solution();
        let headers = vec!["pos".to_string(), "vel".to_string()];
        save_solution_to_csv(&sol, &headers, path.to_str().unwrap(), &"t".to_string()).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let got_headers: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(got_headers, vec!["t", "pos", "vel"]);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[1][0], "0.5");
        assert_eq!(&rows[1][1], "0.5");
        assert_eq!(&rows[1][2], "1");
    }

    #[test]
    fn default_name_carries_the_extension() {
        let name = default_result_name("csv");
        assert!(name.starts_with("shooting_result_"));
        assert!(name.ends_with(".csv"));
    }
}
