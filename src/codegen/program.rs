//! Whole programs: statements, scattering functions and the generated loop tree.

use log::{debug, info, warn};
use num_traits::Zero;
use serde::{Serialize, Deserialize};
use std::fmt;
use std::sync::Arc;

use crate::codegen::block::{BlockArena, BlockId, Statement};
use crate::codegen::loops::{GenerationItem, Generator, Loop};
use crate::codegen::names::{self, Names, FIRST_ITERATOR, FIRST_PARAMETER, SCATTERING_PREFIX};
use crate::polyhedral::{AffineMap, Domain, PolyContext, Value};
use crate::utils::errors::{PolyError, PolyResult};
use crate::GenerationOptions;

/// Output language tag of a program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    /// C
    #[default]
    C,
    /// Fortran
    Fortran,
}

impl Language {
    /// Parse the one-letter tag of the input format.
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'c' | 'C' => Some(Language::C),
            'f' | 'F' => Some(Language::Fortran),
            _ => None,
        }
    }

    /// The one-letter tag of the input format.
    pub fn tag(self) -> char {
        match self {
            Language::C => 'c',
            Language::Fortran => 'f',
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::C => write!(f, "C"),
            Language::Fortran => write!(f, "Fortran"),
        }
    }
}

/// Everything a program is built from.
///
/// Statement domains span the statement iterators followed by the
/// parameters. Scattering functions, when present, come one per statement
/// and span the scattering dimensions, the statement iterators and the
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramInput {
    /// Language tag
    pub language: Language,
    /// Constraints on the parameters
    pub context: Domain,
    /// Parameter names, generated when absent
    pub parameter_names: Option<Vec<String>>,
    /// Iteration domain of each statement
    pub statements: Vec<Domain>,
    /// Iterator names, generated when absent
    pub iterator_names: Option<Vec<String>>,
    /// Scattering function of each statement, or none at all
    pub scatterings: Vec<Domain>,
    /// Scattering dimension names, generated when absent
    pub scattering_names: Option<Vec<String>>,
}

impl ProgramInput {
    /// An input with the given parameter context and no statement.
    pub fn new(context: Domain) -> Self {
        Self {
            language: Language::C,
            context,
            parameter_names: None,
            statements: Vec::new(),
            iterator_names: None,
            scatterings: Vec::new(),
            scattering_names: None,
        }
    }

    /// Add a statement.
    pub fn with_statement(mut self, domain: Domain) -> Self {
        self.statements.push(domain);
        self
    }

    /// Add the scattering function of the next statement.
    pub fn with_scattering(mut self, scattering: Domain) -> Self {
        self.scatterings.push(scattering);
        self
    }

    /// Number of parameters.
    pub fn nb_parameters(&self) -> usize {
        self.context.dim()
    }
}

/// A statement on its way through blocking and scattering.
struct Entry {
    block: BlockId,
    depth: usize,
    domain: Domain,
    scattering: Option<Domain>,
}

/// A generated program.
#[derive(Debug, Clone)]
pub struct Program {
    language: Language,
    nb_scattdims: usize,
    context: Domain,
    loops: Vec<Loop>,
    names: Arc<Names>,
    blocks: BlockArena,
    block_list: Vec<BlockId>,
    scaldims: Vec<bool>,
    compilable: Option<i64>,
}

impl Program {
    /// Build a program with the backend selected in `options`.
    pub fn build(input: &ProgramInput, options: &GenerationOptions) -> PolyResult<Program> {
        let ctx = PolyContext::new(options.backend, options.max_rows);
        Self::build_with(input, options, &ctx)
    }

    /// Build a program with a caller-provided backend context.
    pub fn build_with(input: &ProgramInput, options: &GenerationOptions, ctx: &PolyContext) -> PolyResult<Program> {
        let nb_par = input.nb_parameters();
        if input.context.is_marked_empty() || ctx.is_empty(&input.context)? {
            return Err(PolyError::EmptyContext);
        }
        let depths = statement_depths(input)?;
        let nb_iterators = depths.iter().copied().max().unwrap_or(0);
        let nb_scattdims = scattering_dims(input, &depths)?;
        info!(
            "building program: {} statement(s), {} parameter(s), {} scattering dimension(s)",
            input.statements.len(),
            nb_par,
            nb_scattdims
        );

        let mut blocks = BlockArena::new();
        let mut entries: Vec<Entry> = input
            .statements
            .iter()
            .zip(&depths)
            .enumerate()
            .map(|(i, (domain, &depth))| Entry {
                block: blocks.alloc(vec![Statement::new(i + 1)], depth),
                depth,
                domain: domain.clone(),
                scattering: input.scatterings.get(i).cloned(),
            })
            .collect();

        if nb_scattdims > 0 && !options.noblocks {
            entries = block_statements(entries, &mut blocks, nb_scattdims)?;
        }
        let mut scaldims = vec![false; nb_scattdims];
        if nb_scattdims > 0 && !options.noscalars {
            extract_scalars(&mut entries, &mut blocks, &mut scaldims);
        }
        let nb_remaining = nb_scattdims - scaldims.iter().filter(|&&s| s).count();

        let mut items = Vec::with_capacity(entries.len());
        for entry in &entries {
            let domain = match &entry.scattering {
                Some(scattering) => scatter(ctx, &entry.domain, scattering)?,
                None => entry.domain.clone(),
            };
            items.push(GenerationItem {
                domain,
                block: entry.block,
                depth: nb_remaining + entry.depth,
                scalars: blocks.get(entry.block).scalars().to_vec(),
            });
        }

        let (first_level, last_level) = separation_levels(options, nb_scattdims);
        let generator =
            Generator::new(ctx, nb_par, &scaldims, !options.nosimplify).with_levels(first_level, last_level);
        let loops = generator.generate(&items, &input.context, 1, 0)?;
        for node in &loops {
            for leaf in node.iter() {
                if let Some(id) = leaf.block() {
                    blocks.share(id);
                }
            }
        }
        debug!("{} live block(s) after generation", blocks.live_count());

        let names = Names {
            scalars: Vec::new(),
            scattering: fill_names(
                input.scattering_names.as_deref(),
                names::generate_prefixed(SCATTERING_PREFIX, nb_scattdims),
            ),
            iterators: fill_names(
                input.iterator_names.as_deref(),
                names::generate_letters(FIRST_ITERATOR, nb_iterators),
            ),
            parameters: fill_names(
                input.parameter_names.as_deref(),
                names::generate_letters(FIRST_PARAMETER, nb_par),
            ),
        }
        .scalarize(&scaldims);

        Ok(Program {
            language: options.language.unwrap_or(input.language),
            nb_scattdims,
            context: input.context.clone(),
            loops,
            names: Arc::new(names),
            block_list: entries.iter().map(|e| e.block).collect(),
            blocks,
            scaldims,
            compilable: options.compilable,
        })
    }

    /// Language tag.
    pub fn language(&self) -> Language {
        self.language
    }

    /// Number of scattering dimensions in the input, scalar ones included.
    pub fn nb_scattdims(&self) -> usize {
        self.nb_scattdims
    }

    /// Number of parameters.
    pub fn nb_parameters(&self) -> usize {
        self.context.dim()
    }

    /// Constraints on the parameters.
    pub fn context(&self) -> &Domain {
        &self.context
    }

    /// Outermost nodes of the loop tree.
    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    /// Dimension names.
    pub fn names(&self) -> &Arc<Names> {
        &self.names
    }

    /// The block arena.
    pub fn blocks(&self) -> &BlockArena {
        &self.blocks
    }

    /// Blocks in input order.
    pub fn block_list(&self) -> &[BlockId] {
        &self.block_list
    }

    /// Parameter value of the compilable C output, if requested.
    pub fn compilable(&self) -> Option<i64> {
        self.compilable
    }

    /// Per input scattering dimension: true when scalar.
    pub fn scaldims(&self) -> &[bool] {
        &self.scaldims
    }

    /// Every (statement, loop coordinates) pair the program executes for the
    /// given parameter values, in execution order.
    pub fn points(&self, params: &[i64]) -> PolyResult<Vec<(Statement, Vec<i64>)>> {
        if params.len() != self.nb_parameters() {
            return Err(PolyError::DimensionMismatch {
                operation: "parameter values",
                expected: self.nb_parameters(),
                found: params.len(),
            });
        }
        if !self.context.contains_i64(params) {
            warn!("parameter values {:?} lie outside the context", params);
            return Ok(Vec::new());
        }
        let mut points = Vec::new();
        for node in &self.loops {
            node.enumerate(&mut Vec::new(), params, &mut |id, coords| {
                for &stmt in self.blocks.get(id).statements() {
                    points.push((stmt, coords.to_vec()));
                }
            })?;
        }
        Ok(points)
    }

    /// Serializable view of the program.
    pub fn dump(&self) -> ProgramDump<'_> {
        ProgramDump {
            language: self.language,
            nb_scattdims: self.nb_scattdims,
            scaldims: &self.scaldims,
            context: &self.context,
            names: &self.names,
            blocks: self
                .block_list
                .iter()
                .map(|&id| {
                    let block = self.blocks.get(id);
                    BlockDump { statements: block.statements(), depth: block.depth(), scalars: block.scalars() }
                })
                .collect(),
            loops: &self.loops,
        }
    }
}

/// Borrowed, serializable view of a [`Program`].
#[derive(Debug, Serialize)]
pub struct ProgramDump<'a> {
    language: Language,
    nb_scattdims: usize,
    scaldims: &'a [bool],
    context: &'a Domain,
    names: &'a Names,
    blocks: Vec<BlockDump<'a>>,
    loops: &'a [Loop],
}

#[derive(Debug, Serialize)]
struct BlockDump<'a> {
    statements: &'a [Statement],
    depth: usize,
    scalars: &'a [Value],
}

/// Depths between which overlapping domains are separated. A last depth
/// inside the scattering dimensions is raised to the scattering depth; a
/// first depth past one lowers an unlimited or deeper last depth to it.
fn separation_levels(options: &GenerationOptions, nb_scattdims: usize) -> (usize, Option<usize>) {
    let first = options.first_level.max(1);
    let mut last = options.last_level;
    if let Some(l) = last {
        if l < nb_scattdims {
            warn!("last separation depth {} is inside the scattering, using {}", l, nb_scattdims);
            last = Some(nb_scattdims);
        }
    }
    if first > 1 && last.map_or(true, |l| l > nb_scattdims) {
        debug!("first separation depth {}: separating up to depth {} only", first, nb_scattdims);
        last = Some(nb_scattdims);
    }
    (first, last)
}

/// Iterator count of every statement.
fn statement_depths(input: &ProgramInput) -> PolyResult<Vec<usize>> {
    let nb_par = input.nb_parameters();
    input
        .statements
        .iter()
        .map(|d| {
            d.dim().checked_sub(nb_par).ok_or(PolyError::DimensionMismatch {
                operation: "statement domain",
                expected: nb_par,
                found: d.dim(),
            })
        })
        .collect()
}

/// Number of scattering dimensions, checked against every statement.
fn scattering_dims(input: &ProgramInput, depths: &[usize]) -> PolyResult<usize> {
    if input.scatterings.is_empty() {
        return Ok(0);
    }
    if input.scatterings.len() != input.statements.len() {
        return Err(PolyError::DimensionMismatch {
            operation: "scattering functions",
            expected: input.statements.len(),
            found: input.scatterings.len(),
        });
    }
    let nb_par = input.nb_parameters();
    let first = input.scatterings[0].dim();
    let nb_scattdims = first.checked_sub(depths[0] + nb_par).ok_or(PolyError::DimensionMismatch {
        operation: "scattering function",
        expected: depths[0] + nb_par,
        found: first,
    })?;
    for (scattering, depth) in input.scatterings.iter().zip(depths) {
        let expected = nb_scattdims + depth + nb_par;
        if scattering.dim() != expected {
            return Err(PolyError::DimensionMismatch {
                operation: "scattering function",
                expected,
                found: scattering.dim(),
            });
        }
    }
    Ok(nb_scattdims)
}

/// Merge consecutive statements with equal domains and scattering functions
/// that differ by one in their last fixed dimension.
fn block_statements(entries: Vec<Entry>, blocks: &mut BlockArena, nb_scattdims: usize) -> PolyResult<Vec<Entry>> {
    let scatterings: Vec<Domain> = entries
        .iter()
        .map(|e| e.scattering.clone().unwrap_or_else(|| Domain::empty(0)))
        .collect();
    let mut live = vec![true; entries.len()];
    let mut start = 0;
    for k in 1..entries.len() {
        let reference = k - 1;
        let candidates = scatterings.iter().zip(&live).filter(|(_, l)| **l).map(|(s, _)| s);
        if entries[reference].domain.lazy_equal(&entries[k].domain)
            && scatterings[reference].lazy_block(&scatterings[k], candidates, nb_scattdims)
        {
            let into = blocks.merge(entries[start].block, entries[k].block)?;
            debug!("statement {} joins block {}", k + 1, into.index());
            blocks.release(entries[k].block);
            live[k] = false;
        } else {
            start = k;
        }
    }
    let merged = live.iter().filter(|&&l| !l).count();
    if merged > 0 {
        info!("{} statement(s) merged into blocks", merged);
    }
    Ok(entries.into_iter().zip(live).filter(|(_, l)| *l).map(|(e, _)| e).collect())
}

/// Move the dimensions that every scattering function fixes to a constant
/// into the block scalar arrays.
fn extract_scalars(entries: &mut [Entry], blocks: &mut BlockArena, scaldims: &mut [bool]) {
    for (dim, flag) in scaldims.iter_mut().enumerate() {
        *flag = entries
            .iter()
            .all(|e| e.scattering.as_ref().map_or(false, |s| s.lazy_isscalar(dim)));
    }
    let scalar_dims: Vec<usize> = (0..scaldims.len()).filter(|&d| scaldims[d]).collect();
    if scalar_dims.is_empty() {
        return;
    }
    debug!("scalar scattering dimension(s): {:?}", scalar_dims);
    for entry in entries.iter_mut() {
        let Some(scattering) = entry.scattering.as_mut() else { continue };
        let values = scalar_dims
            .iter()
            .map(|&d| scattering.scalar(d).unwrap_or_else(Value::zero))
            .collect();
        blocks.set_scalars(entry.block, values);
        for &d in scalar_dims.iter().rev() {
            *scattering = scattering.erase_dimension(d);
        }
    }
}

/// Embed a statement domain after the scattering dimensions and add the
/// scattering constraints.
fn scatter(ctx: &PolyContext, domain: &Domain, scattering: &Domain) -> PolyResult<Domain> {
    let n = scattering.dim();
    let first = n - domain.dim();
    let columns: Vec<usize> = (first..n).collect();
    let embedded = ctx.preimage(domain, &AffineMap::selection(n, &columns))?;
    if scattering.nb_members() == 1 {
        scattering.add_constraints(&embedded)
    } else {
        ctx.intersection(scattering, &embedded)
    }
}

/// Given names first, generated ones for the rest.
fn fill_names(given: Option<&[String]>, generated: Vec<String>) -> Vec<String> {
    match given {
        None => generated,
        Some(given) => {
            let mut result: Vec<String> = given.iter().take(generated.len()).cloned().collect();
            result.extend(generated.into_iter().skip(given.len()));
            result
        }
    }
}
