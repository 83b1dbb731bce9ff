use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    path::Path,
};

use kdam::BarExt;
use serde::{Deserialize, Serialize};

use crate::{
    data_dir::{DataDir, write_atomic},
    embedding::{Embedder, EmbeddingMatrix},
    error::{Error, Result},
    normalize::{load_metadata_dir, record_from_scan},
    record::UnifiedRecord,
    scanner::{ScanRecord, ScanReport, ScanStatus, progress_bar},
    text_util::{path_key, split_terms},
};

/// Filter axis -> sorted distinct values.
pub type FilterOptions = BTreeMap<String, BTreeSet<String>>;

/// Written last; its presence marks a complete index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub categories: Vec<String>,
    pub records: usize,
    pub dimension: usize,
    pub model: String,
}

/// Everything the query service loads, ready to be written out.
#[derive(Debug, Clone)]
pub struct BuiltIndex {
    pub records: Vec<UnifiedRecord>,
    pub texts: Vec<String>,
    pub filters: FilterOptions,
    pub embeddings: EmbeddingMatrix,
    pub manifest: Manifest,
}

/// Inputs and knobs of an index build.
pub struct BuildOptions<'a> {
    pub categories: &'a [String],
    pub embedder: &'a dyn Embedder,
    pub batch_size: usize,
    pub show_progress: bool,
}

fn category_map(scan: &ScanRecord, categories: &[String]) -> BTreeMap<String, String> {
    categories
        .iter()
        .zip(&scan.categories)
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Merge scan rows and metadata records into the record list.
///
/// Only successful scan rows take part. A scan row's categories are
/// attached to every metadata record describing the same path; scan rows
/// without a metadata counterpart become records of their own, after the
/// metadata records and in scan order.
pub fn collect_records(
    scan: Option<&ScanReport>,
    metadata: Vec<UnifiedRecord>,
) -> Vec<UnifiedRecord> {
    let Some(scan) = scan else {
        return metadata;
    };

    let successful: Vec<&ScanRecord> = scan
        .records
        .iter()
        .filter(|r| r.status == ScanStatus::Success)
        .collect();
    let by_path: HashMap<String, usize> = successful
        .iter()
        .enumerate()
        .map(|(idx, r)| (path_key(&r.file_path), idx))
        .collect();

    let mut matched = vec![false; successful.len()];
    let mut records = metadata;
    for record in &mut records {
        if let Some(&idx) = by_path.get(&path_key(&record.path)) {
            record.categories = category_map(successful[idx], &scan.categories);
            matched[idx] = true;
        }
    }

    for (idx, row) in successful.iter().enumerate() {
        if matched[idx] {
            continue;
        }
        let mut record = record_from_scan(row);
        record.categories = category_map(row, &scan.categories);
        records.push(record);
    }

    records
}

/// Distinct non-empty values per filter axis: `type`, `species`,
/// `activity`, then one axis per category with its terms split apart.
pub fn build_filter_options(
    records: &[UnifiedRecord],
    categories: &[String],
) -> FilterOptions {
    let mut options = FilterOptions::new();
    for axis in ["type", "species", "activity"]
        .into_iter()
        .chain(categories.iter().map(String::as_str))
    {
        options.insert(axis.to_string(), BTreeSet::new());
    }

    let mut add = |axis: &str, value: &str| {
        if let Some(set) = options.get_mut(axis)
            && !value.is_empty()
        {
            set.insert(value.to_string());
        }
    };

    for record in records {
        add("type", record.type_tag());
        add("species", &record.species);
        add("activity", &record.activity);
        for category in categories {
            for term in split_terms(record.category(category)) {
                add(category, term);
            }
        }
    }
    options
}

/// Embed `texts` in batches. The result has exactly one row per text.
pub fn embed_corpus(
    texts: &[String],
    embedder: &dyn Embedder,
    batch_size: usize,
    show_progress: bool,
) -> Result<EmbeddingMatrix> {
    let dimension = embedder.dimension()?;
    let mut bar = progress_bar(texts.len(), "Embedding", show_progress);

    let mut rows = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = embedder.embed_batch(batch)?;
        if vectors.len() != batch.len() {
            return Err(Error::Misaligned {
                records: batch.len(),
                rows: vectors.len(),
            });
        }
        rows.extend(vectors);
        if let Some(bar) = bar.as_mut() {
            let _ = bar.update(batch.len());
        }
    }
    if let Some(bar) = bar.as_mut() {
        let _ = bar.refresh();
    }

    EmbeddingMatrix::from_rows(rows, dimension)
}

/// Build the full index in memory.
pub fn build_index(
    scan: Option<&ScanReport>,
    metadata: Vec<UnifiedRecord>,
    options: &BuildOptions<'_>,
) -> Result<BuiltIndex> {
    if let Some(scan) = scan
        && scan.categories != options.categories
    {
        return Err(Error::SchemaMismatch(format!(
            "scan categories {:?} differ from configured {:?}",
            scan.categories, options.categories
        )));
    }

    let records = collect_records(scan, metadata);
    if records.is_empty() {
        return Err(Error::Config(
            "nothing to index: no successful scan rows or metadata records".into(),
        ));
    }
    tracing::info!("indexing {} records", records.len());

    let texts: Vec<String> = records.iter().map(UnifiedRecord::searchable_text).collect();
    let filters = build_filter_options(&records, options.categories);
    let embeddings = embed_corpus(
        &texts,
        options.embedder,
        options.batch_size,
        options.show_progress,
    )?;

    if embeddings.rows() != records.len() {
        return Err(Error::Misaligned {
            records: records.len(),
            rows: embeddings.rows(),
        });
    }

    let manifest = Manifest {
        categories: options.categories.to_vec(),
        records: records.len(),
        dimension: embeddings.dimension(),
        model: options.embedder.model_name().to_string(),
    };

    Ok(BuiltIndex {
        records,
        texts,
        filters,
        embeddings,
        manifest,
    })
}

/// Load inputs from disk and build. A missing scan artifact is tolerated
/// when a metadata directory is given.
pub fn build_from_paths(
    scan_path: &Path,
    metadata_dir: Option<&Path>,
    options: &BuildOptions<'_>,
) -> Result<BuiltIndex> {
    let scan = if scan_path.is_file() {
        Some(crate::scanner::read_scan_csv(scan_path, options.categories)?)
    } else if metadata_dir.is_some() {
        tracing::warn!("no scan artifact at {}", scan_path.display());
        None
    } else {
        return Err(Error::MissingArtifact(scan_path.to_path_buf()));
    };

    let metadata = match metadata_dir {
        Some(dir) => load_metadata_dir(dir)?,
        None => Vec::new(),
    };

    build_index(scan.as_ref(), metadata, options)
}

/// Write every artifact atomically; the manifest goes last.
pub fn write_artifacts(index: &BuiltIndex, data_dir: &DataDir) -> Result<()> {
    write_atomic(
        &data_dir.records_json(),
        &serde_json::to_vec_pretty(&index.records)?,
    )?;
    write_atomic(
        &data_dir.filters_json(),
        &serde_json::to_vec_pretty(&index.filters)?,
    )?;
    index.embeddings.write(&data_dir.embeddings_bin())?;

    let mut texts = String::new();
    for text in &index.texts {
        texts.push_str(text);
        texts.push('\n');
    }
    write_atomic(&data_dir.searchable_texts(), texts.as_bytes())?;

    write_atomic(
        &data_dir.manifest_json(),
        &serde_json::to_vec_pretty(&index.manifest)?,
    )?;
    tracing::info!(
        "wrote index of {} records to {}",
        index.manifest.records,
        data_dir.root().display()
    );
    Ok(())
}
