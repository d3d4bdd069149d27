//! Utility functions for testing
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

/// Generate a random DNA sequence of given length
pub fn generate_dna_sequence(length: usize) -> String {
    use rand::{thread_rng, Rng};
    let bases = ['A', 'C', 'G', 'T'];
    let mut rng = thread_rng();

    (0..length).map(|_| bases[rng.gen_range(0..4)]).collect()
}

/// SAM header with one @SQ line per (name, length)
pub fn sam_header(contigs: &[(&str, u64)]) -> String {
    let mut header = String::from("@HD\tVN:1.6\tSO:unsorted\n");
    for (name, len) in contigs {
        header.push_str(&format!("@SQ\tSN:{name}\tLN:{len}\n"));
    }
    header
}

/// One SAM line with a full-length match CIGAR and a random sequence
pub fn sam_line(name: &str, flag: u32, contig: &str, pos: i64, mapq: u8, len: usize, tags: &[&str]) -> String {
    let (cigar, pos) = if flag & 0x4 != 0 {
        ("*".to_string(), 0)
    } else {
        (format!("{len}M"), pos)
    };
    let contig = if flag & 0x4 != 0 { "*" } else { contig };
    let mut line = format!(
        "{name}\t{flag}\t{contig}\t{pos}\t{mapq}\t{cigar}\t*\t0\t0\t{}\t{}",
        generate_dna_sequence(len),
        "I".repeat(len)
    );
    for tag in tags {
        line.push('\t');
        line.push_str(tag);
    }
    line.push('\n');
    line
}

/// Write a pairing file with the given "name id orientation mean sd" lines
pub fn create_pairing_file(path: &Path, lines: &[&str]) {
    let mut content = String::from("# name id orientation mean stddev\n");
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(path, content).expect("Failed to write pairing file");
}

/// Run the clonemark binary with the given arguments
pub fn run_clonemark(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_clonemark"))
        .args(args)
        .output()
        .expect("Failed to run clonemark")
}

/// Non-header lines of a SAM text
pub fn records(sam: &str) -> Vec<&str> {
    sam.lines().filter(|l| !l.starts_with('@')).collect()
}

/// FLAG field of a SAM record line
pub fn flag_of(line: &str) -> u32 {
    line.split('\t')
        .nth(1)
        .and_then(|f| f.parse().ok())
        .expect("record has a numeric FLAG")
}
