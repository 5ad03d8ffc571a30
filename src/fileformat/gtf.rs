use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;

use log::debug;
use log::info;
use noodles::gff;
use noodles::gff::feature::RecordBuf;
use noodles::gtf;

use crate::runtime::Error;

pub struct GtfParseSettings {
    pub use_feature: String,
    pub attr_name: String,
}

impl Default for GtfParseSettings {
    fn default() -> Self {
        GtfParseSettings {
            use_feature: "gene".to_string(),
            attr_name: "gene_name".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
    Unknown,
}

impl Strand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strand::Forward => "+",
            Strand::Reverse => "-",
            Strand::Unknown => ".",
        }
    }
}

#[derive(Clone, Debug)]
pub struct GeneMeta {
    pub gene_chr: String,
    pub gene_start: u64,
    pub gene_end: u64,
    pub gene_strand: Strand,
    pub gene_name: String,
}

impl GeneMeta {
    /// 1-based transcription start site. Only a '+' strand starts at the
    /// feature start; everything else is read from the end
    pub fn tss(&self) -> u64 {
        if self.gene_strand == Strand::Forward {
            self.gene_start
        } else {
            self.gene_end
        }
    }
}

///
/// Features of one kind read from a GTF file
///
pub struct FeatureCollection {
    pub list_feature: Vec<GeneMeta>,
    pub failed_to_get_name: usize,
}
impl FeatureCollection {
    pub fn new() -> FeatureCollection {
        FeatureCollection {
            list_feature: Vec::new(),
            failed_to_get_name: 0,
        }
    }

    ///
    /// For GTF reading, process one record
    ///
    fn add_gene_record(collection: &mut FeatureCollection, params: &GtfParseSettings, record: &RecordBuf) {
        //Only keep the features that were asked for; typically genes
        if record.ty() != params.use_feature {
            return;
        }

        let gene_strand = match record.strand() {
            gff::feature::record::Strand::Forward => Strand::Forward,
            gff::feature::record::Strand::Reverse => Strand::Reverse,
            _ => Strand::Unknown,
        };

        let attr_name = record
            .attributes()
            .get(params.attr_name.as_bytes())
            .and_then(|value| value.as_string());
        match attr_name {
            Some(name) => collection.list_feature.push(GeneMeta {
                gene_chr: record.reference_sequence_name().to_string(),
                gene_start: record.start().get() as u64,
                gene_end: record.end().get() as u64,
                gene_strand,
                gene_name: name.to_string(),
            }),
            None => collection.failed_to_get_name += 1,
        }
    }

    ///
    /// Read GTF records from any buffered reader
    ///
    pub fn read_from_reader<R: BufRead>(
        reader: R,
        params: &GtfParseSettings,
        context: &str,
    ) -> anyhow::Result<FeatureCollection> {
        let mut reader = gtf::io::Reader::new(reader);
        let mut collection = FeatureCollection::new();
        for result in reader.record_bufs() {
            let record = result.map_err(|e| Error::parse_error(format!("GTF {}", context), Some(e.to_string())))?;
            Self::add_gene_record(&mut collection, params, &record);
        }
        Ok(collection)
    }

    ///
    /// Read a GTF file, plain or compressed
    ///
    pub fn read_file(path_gtf: &Path, params: &GtfParseSettings) -> anyhow::Result<FeatureCollection> {
        crate::runtime::require_nonempty(path_gtf)?;

        info!("Reading GTF: {:?}", path_gtf);
        let (reader, format) = niffler::from_path(path_gtf)?;
        debug!("GTF compression detected as {:?}", format);

        let gtf = Self::read_from_reader(
            BufReader::new(reader),
            params,
            &path_gtf.display().to_string(),
        )?;

        info!(
            "Done reading GTF; {} '{}' features, {} without a '{}' attribute",
            gtf.list_feature.len(),
            params.use_feature,
            gtf.failed_to_get_name,
            params.attr_name
        );
        Ok(gtf)
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new()
    }
}

/*
GTF columns: seqname source feature start end score strand frame attributes

chr1	HAVANA	gene	11869	14409	.	+	.	gene_id "ENSG00000290825.1"; gene_type "lncRNA"; gene_name "DDX11L2"; level 2;
*/
