//! Archive of the best genomes seen across rounds, with JSON export.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::schema::Genome;

use super::fitness::BehaviorRecord;

/// Archive for storing evolved genomes.
#[derive(Debug, Default)]
pub struct GenomeArchive {
    /// Stored genomes indexed by critter serial.
    entries: HashMap<u64, ArchivedGenome>,
    /// Output directory for saving genomes.
    output_dir: Option<PathBuf>,
    /// Maximum archive size.
    capacity: usize,
}

/// A genome together with how it was earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedGenome {
    /// Serial of the critter that carried the genome.
    pub serial: u64,
    /// Round the critter was scored in.
    pub round: u64,
    pub fitness: f32,
    pub genome: Genome,
    #[serde(default)]
    pub record: BehaviorRecord,
    #[serde(default)]
    pub tags: Vec<String>,
    /// File path if saved.
    #[serde(skip)]
    pub saved_path: Option<PathBuf>,
}

/// Archive I/O errors.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Archive has no output directory")]
    NoOutputDir,
    #[error("No archived genome with serial {0}")]
    NotFound(u64),
    #[error("Archive I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("Archive entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenomeArchive {
    /// Create a new archive.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            output_dir: None,
            capacity,
        }
    }

    /// Set output directory for saving genomes.
    pub fn with_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Result<Self, ArchiveError> {
        let path = dir.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;
        self.output_dir = Some(path);
        Ok(self)
    }

    /// Offer a genome. When full, the weakest entry is replaced only by a
    /// fitter one. Returns the serial if the genome was kept.
    pub fn add(&mut self, entry: ArchivedGenome) -> Option<u64> {
        if self.capacity == 0 || self.entries.contains_key(&entry.serial) {
            return None;
        }

        if self.entries.len() >= self.capacity {
            let weakest = self
                .entries
                .values()
                .min_by(|a, b| a.fitness.total_cmp(&b.fitness))
                .map(|e| (e.serial, e.fitness));
            if let Some((serial, fitness)) = weakest {
                if entry.fitness <= fitness {
                    return None;
                }
                self.entries.remove(&serial);
            }
        }

        let serial = entry.serial;
        self.entries.insert(serial, entry);
        Some(serial)
    }

    /// Entry for `serial`, if retained.
    pub fn get(&self, serial: u64) -> Option<&ArchivedGenome> {
        self.entries.get(&serial)
    }

    /// Every retained entry, unordered.
    pub fn all(&self) -> impl Iterator<Item = &ArchivedGenome> {
        self.entries.values()
    }

    /// Get entries by tag.
    pub fn by_tag(&self, tag: &str) -> impl Iterator<Item = &ArchivedGenome> {
        self.entries
            .values()
            .filter(move |e| e.tags.iter().any(|t| t == tag))
    }

    /// Top N entries by fitness.
    pub fn top_n(&self, n: usize) -> Vec<&ArchivedGenome> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|a, b| b.fitness.total_cmp(&a.fitness).then(a.serial.cmp(&b.serial)));
        entries.into_iter().take(n).collect()
    }

    /// Genomes ordered fittest first.
    pub fn genomes(&self) -> Vec<Genome> {
        self.top_n(self.entries.len())
            .into_iter()
            .map(|e| e.genome.clone())
            .collect()
    }

    /// Save one entry to disk.
    pub fn save_genome(&mut self, serial: u64) -> Result<PathBuf, ArchiveError> {
        let output_dir = self.output_dir.as_ref().ok_or(ArchiveError::NoOutputDir)?;
        let entry = self
            .entries
            .get_mut(&serial)
            .ok_or(ArchiveError::NotFound(serial))?;

        let filename = format!(
            "genome_{}_round{}_fit{:.3}.json",
            serial, entry.round, entry.fitness
        );
        let path = output_dir.join(filename);

        let json = serde_json::to_string_pretty(entry)?;
        fs::write(&path, json)?;

        entry.saved_path = Some(path.clone());
        Ok(path)
    }

    /// Save every entry to disk.
    pub fn save_all(&mut self) -> Result<Vec<PathBuf>, ArchiveError> {
        let serials: Vec<u64> = self.entries.keys().copied().collect();
        serials.into_iter().map(|s| self.save_genome(s)).collect()
    }

    /// Load every `.json` entry in `dir`. Unreadable files are skipped.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P, capacity: usize) -> Result<Self, ArchiveError> {
        let dir = dir.as_ref();
        let mut archive = Self::new(capacity);
        archive.output_dir = Some(dir.to_path_buf());

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            match load_entry(&path) {
                Ok(mut loaded) => {
                    loaded.saved_path = Some(path);
                    archive.add(loaded);
                }
                Err(err) => log::warn!("Skipping {}: {}", path.display(), err),
            }
        }

        log::info!("Loaded {} genomes from {}", archive.len(), dir.display());
        Ok(archive)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn load_entry(path: &Path) -> Result<ArchivedGenome, ArchiveError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Tags describing how a critter earned its fitness.
pub fn auto_categorize(record: &BehaviorRecord, max_food: f32) -> Vec<String> {
    let mut tags = Vec::new();

    if record.got_food {
        tags.push("forager".to_string());
    }
    if record.enemies_eaten > 0.0 {
        tags.push("raider".to_string());
    }
    if max_food > 0.0 && record.food_eaten >= max_food {
        tags.push("full".to_string());
    }
    if record.at_city && !record.got_food {
        tags.push("homebody".to_string());
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_entry(serial: u64, fitness: f32) -> ArchivedGenome {
        ArchivedGenome {
            serial,
            round: 0,
            fitness,
            genome: Genome::standard(),
            record: BehaviorRecord::default(),
            tags: Vec::new(),
            saved_path: None,
        }
    }

    #[test]
    fn test_archive_add() {
        let mut archive = GenomeArchive::new(10);
        assert_eq!(archive.add(test_entry(1, 0.5)), Some(1));
        assert_eq!(archive.add(test_entry(2, 0.7)), Some(2));
        assert_eq!(archive.add(test_entry(2, 0.9)), None);
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn test_archive_capacity() {
        let mut archive = GenomeArchive::new(2);
        archive.add(test_entry(1, 0.3));
        archive.add(test_entry(2, 0.5));

        assert_eq!(archive.add(test_entry(3, 0.1)), None);
        archive.add(test_entry(4, 0.7));
        assert_eq!(archive.len(), 2);
        assert!(archive.get(1).is_none());
        assert!(archive.get(4).is_some());
    }

    #[test]
    fn test_top_n() {
        let mut archive = GenomeArchive::new(10);
        archive.add(test_entry(1, 0.3));
        archive.add(test_entry(2, 0.7));
        archive.add(test_entry(3, 0.5));

        let top2 = archive.top_n(2);
        assert_eq!(top2.len(), 2);
        assert_eq!(top2[0].serial, 2);
        assert_eq!(top2[1].serial, 3);
    }

    #[test]
    fn test_by_tag() {
        let mut archive = GenomeArchive::new(10);
        let mut raider = test_entry(1, 1.0);
        raider.tags = vec!["raider".into()];
        archive.add(raider);
        archive.add(test_entry(2, 1.0));
        assert_eq!(archive.by_tag("raider").count(), 1);
    }

    #[test]
    fn test_save_requires_output_dir() {
        let mut archive = GenomeArchive::new(10);
        archive.add(test_entry(1, 0.3));
        assert!(matches!(
            archive.save_genome(1),
            Err(ArchiveError::NoOutputDir)
        ));
    }

    #[test]
    fn test_save_and_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = GenomeArchive::new(10).with_output_dir(dir.path()).unwrap();
        archive.add(test_entry(1, 0.3));
        archive.add(test_entry(2, 1.25));

        let paths = archive.save_all().unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().any(|p| p.ends_with("genome_2_round0_fit1.250.json")));

        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = GenomeArchive::load_from_dir(dir.path(), 10).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.top_n(1)[0].serial, 2);
        assert_eq!(loaded.get(1).unwrap().genome, Genome::standard());
    }

    #[test]
    fn test_auto_categorize() {
        let record = BehaviorRecord {
            food_eaten: 2.0,
            enemies_eaten: 0.5,
            got_food: true,
            time_to_first_food: Some(1.0),
            at_city: true,
        };
        let tags = auto_categorize(&record, 2.0);
        assert_eq!(tags, vec!["forager", "raider", "full"]);
    }
}
