//! Consolidate memory ports.
//!
//! For each memory in a module this pass applies three transformations in
//! order:
//!
//! 1. Write ports fed by an asynchronous read of the same address through
//!    a mux tree get the mux select conditions folded into their write
//!    enable, with the fed-back mux inputs replaced by don't-cares.
//! 2. Write ports addressing the same location in the same clock domain
//!    are merged into one port, preserving per-bit enable granularity and
//!    the priority of intervening writes.
//! 3. Consecutive write ports in a clock domain whose enables are proven
//!    mutually exclusive by a SAT query over their shared input cone are
//!    merged under a selector mux.
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use bract_ir::{
    CellId, CellType, Module, SigBit, SigMap, SigSpec, State,
};
use bract_utils::{BractResult, Error};

use crate::analysis::{ModWalker, SatGen};
use crate::pass_manager::{Named, Pass};

/// A conjunction of required select-bit values along one mux path.
type Cube = BTreeMap<SigBit, bool>;
/// A set of cubes under which a write must stay disabled.
type Conditions = BTreeSet<Cube>;

/// Read and write port lists of one memory, in priority order.
type MemIndex = BTreeMap<String, (Vec<CellId>, Vec<CellId>)>;

/// Merge share-able memory ports into single memory ports.
#[derive(Default)]
pub struct MemoryShare;

impl Named for MemoryShare {
    fn name() -> &'static str {
        "memory-share"
    }

    fn description() -> &'static str {
        "merge share-able memory ports into single memory ports"
    }
}

impl Pass for MemoryShare {
    fn run(&mut self, design: &mut bract_ir::Design) -> BractResult<()> {
        for module in design.iter_selected_mut() {
            log::info!(
                "Consolidating memory ports in module `{}'.",
                module.name
            );
            MemoryShareWorker::new(module).run()?;
        }
        Ok(())
    }
}

struct MemoryShareWorker<'a> {
    module: &'a mut Module,
    sigmap: SigMap,
    /// Extension of `sigmap` that also skips don't-care muxes: the output
    /// of a mux whose other input is fully undefined aliases the defined
    /// input.
    sigmap_xmux: SigMap,
    /// Each mux output bit, mapped to its cell and the bit index in Y.
    sig_to_mux: HashMap<SigBit, (CellId, usize)>,
    /// Identical condition sets share their synthesized enable logic.
    conditions_cache: HashMap<Conditions, SigBit>,
}

impl<'a> MemoryShareWorker<'a> {
    fn new(module: &'a mut Module) -> Self {
        let sigmap = SigMap::from_module(module);
        MemoryShareWorker {
            module,
            sigmap_xmux: sigmap.clone(),
            sigmap,
            sig_to_mux: HashMap::new(),
            conditions_cache: HashMap::new(),
        }
    }

    fn run(&mut self) -> BractResult<()> {
        let mut memindex = self.index_memories()?;

        for (memid, (rd_ports, wr_ports)) in memindex.iter_mut() {
            self.translate_rd_feedback_to_en(memid, rd_ports, wr_ports)?;
            self.consolidate_wr_by_addr(memid, wr_ports)?;
        }

        // The SAT stage reasons over driver cones, so the walker is built
        // after the netlist mutations of the earlier stages.
        let modwalker = ModWalker::new(self.module);
        for (memid, (_, wr_ports)) in memindex.iter_mut() {
            self.consolidate_wr_using_sat(memid, wr_ports, &modwalker)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Indexing
    // -----------------------------------------------------------------

    /// Group memory port cells by memory id, build the mux output index,
    /// and extend the don't-care-skipping signal map.
    fn index_memories(&mut self) -> BractResult<MemIndex> {
        let mut memindex = MemIndex::new();
        let mut priorities: HashMap<CellId, i64> = HashMap::new();

        for (id, cell) in self.module.cells() {
            match cell.ty {
                CellType::Memrd => {
                    let _ = cell.param_bool("CLK_ENABLE")?;
                    memindex
                        .entry(cell.memid()?.to_string())
                        .or_default()
                        .0
                        .push(id);
                }
                CellType::Memwr => {
                    let en = cell.connection("EN")?;
                    let data = cell.connection("DATA")?;
                    if en.width() != data.width() {
                        return Err(Error::malformed_structure(format!(
                            "write port `{}' has EN width {} but DATA \
                             width {}",
                            cell.name(),
                            en.width(),
                            data.width()
                        )));
                    }
                    priorities.insert(id, cell.param_int("PRIORITY")?);
                    memindex
                        .entry(cell.memid()?.to_string())
                        .or_default()
                        .1
                        .push(id);
                }
                CellType::Mux => {
                    let sig_a = self.sigmap_xmux.map(cell.connection("A")?);
                    let sig_b = self.sigmap_xmux.map(cell.connection("B")?);
                    if sig_a.is_fully_undef() {
                        self.sigmap_xmux.add(cell.connection("Y")?, &sig_b);
                    } else if sig_b.is_fully_undef() {
                        self.sigmap_xmux.add(cell.connection("Y")?, &sig_a);
                    }
                }
                _ => {}
            }
            if cell.ty.is_mux_like() {
                let sig_y = self.sigmap.map(cell.connection("Y")?);
                for (i, bit) in sig_y.iter().enumerate() {
                    self.sig_to_mux.insert(bit, (id, i));
                }
            }
        }

        for (rd_ports, wr_ports) in memindex.values_mut() {
            rd_ports.sort_by(|&a, &b| {
                self.module
                    .cell(a)
                    .name()
                    .as_ref()
                    .cmp(self.module.cell(b).name().as_ref())
            });
            wr_ports.sort_by_key(|id| priorities[id]);
        }
        Ok(memindex)
    }

    // -----------------------------------------------------------------
    // Converting feedbacks to async read ports to proper enable signals
    // -----------------------------------------------------------------

    /// Walk backward from a write-port data bit through the mux tree. A
    /// path reaching a fed-back read bit records the select assignments
    /// it assumed and gets its mux input replaced with a don't-care.
    fn find_data_feedback(
        &mut self,
        async_rd_bits: &HashSet<SigBit>,
        sig: SigBit,
        state: &Cube,
        conditions: &mut Conditions,
        visited: &mut HashSet<(SigBit, Cube)>,
    ) -> BractResult<bool> {
        if async_rd_bits.contains(&sig) {
            conditions.insert(state.clone());
            return Ok(true);
        }

        let Some(&(cell_id, bit_idx)) = self.sig_to_mux.get(&sig) else {
            return Ok(false);
        };

        // The mux tree is acyclic in well-formed netlists; the visited
        // set only guards against malformed inputs. Reaching a bit again
        // under a different state is a legitimate second path.
        if !visited.insert((sig, state.clone())) {
            return Ok(false);
        }

        let (sig_a, sig_b, sig_s, sig_y) = {
            let cell = self.module.cell(cell_id);
            (
                self.sigmap.map(cell.connection("A")?),
                self.sigmap.map(cell.connection("B")?),
                self.sigmap.map(cell.connection("S")?),
                self.sigmap.map(cell.connection("Y")?),
            )
        };
        if sig_y.bit(bit_idx) != sig {
            return Err(Error::pass_assumption(
                MemoryShare::name(),
                "mux output index does not match the queried signal bit",
            ));
        }
        let width = sig_y.width();

        // A select already known true pins the path to that alternative.
        for i in 0..sig_s.width() {
            if state.get(&sig_s.bit(i)) == Some(&true) {
                if self.find_data_feedback(
                    async_rd_bits,
                    sig_b.bit(bit_idx + i * width),
                    state,
                    conditions,
                    visited,
                )? {
                    self.module
                        .cell_mut(cell_id)
                        .connection_mut("B")?
                        .replace_bit(bit_idx + i * width, SigBit::X);
                }
                return Ok(false);
            }
        }

        for i in 0..sig_s.width() {
            if state.get(&sig_s.bit(i)) == Some(&false) {
                continue;
            }
            let mut new_state = state.clone();
            new_state.insert(sig_s.bit(i), true);
            if self.find_data_feedback(
                async_rd_bits,
                sig_b.bit(bit_idx + i * width),
                &new_state,
                conditions,
                visited,
            )? {
                self.module
                    .cell_mut(cell_id)
                    .connection_mut("B")?
                    .replace_bit(bit_idx + i * width, SigBit::X);
            }
        }

        let mut new_state = state.clone();
        for i in 0..sig_s.width() {
            new_state.insert(sig_s.bit(i), false);
        }
        if self.find_data_feedback(
            async_rd_bits,
            sig_a.bit(bit_idx),
            &new_state,
            conditions,
            visited,
        )? {
            self.module
                .cell_mut(cell_id)
                .connection_mut("A")?
                .replace_bit(bit_idx, SigBit::X);
        }

        Ok(false)
    }

    /// Synthesize the enable bit that is low exactly when one of the
    /// cubes matches: one inequality per cube, AND-reduced. Identical
    /// condition sets share logic.
    fn conditions_to_logic(
        &mut self,
        conditions: &Conditions,
        created_conditions: &mut usize,
    ) -> SigBit {
        if let Some(&bit) = self.conditions_cache.get(conditions) {
            return bit;
        }

        let mut terms = SigSpec::new();
        for cube in conditions {
            let mut sig1 = SigSpec::new();
            let mut sig2 = SigSpec::new();
            for (&bit, &value) in cube {
                sig1.push(bit);
                sig2.push(value.into());
            }
            terms.append(&self.module.add_ne(sig1, sig2));
            *created_conditions += 1;
        }

        let result = match terms.width() {
            // No conditions: the enable stays asserted.
            0 => SigBit::ONE,
            1 => terms.bit(0),
            _ => self.module.add_reduce_and(terms).bit(0),
        };
        self.conditions_cache.insert(conditions.clone(), result);
        result
    }

    fn translate_rd_feedback_to_en(
        &mut self,
        memid: &str,
        rd_ports: &[CellId],
        wr_ports: &[CellId],
    ) -> BractResult<()> {
        // Bits that leave the mux forest: module outputs, inputs of
        // non-mux cells, mux selects, and any port of this memory other
        // than the data pins themselves.
        let mut non_feedback_nets: HashSet<SigBit> = HashSet::new();
        // For each mux output bit, the input bits it can take its value
        // from.
        let mut muxtree_upstream: HashMap<SigBit, Vec<SigBit>> =
            HashMap::new();

        let output_wires: Vec<_> = self
            .module
            .wires()
            .filter(|(_, w)| w.port_output)
            .map(|(id, _)| id)
            .collect();
        for id in output_wires {
            for bit in self.module.wire_sig(id).iter() {
                non_feedback_nets.insert(self.sigmap.bit(bit));
            }
        }

        for (_, cell) in self.module.cells() {
            if cell.ty.is_mux_like() {
                let sig_a = self.sigmap.map(cell.connection("A")?);
                let sig_b = self.sigmap.map(cell.connection("B")?);
                let sig_s = self.sigmap.map(cell.connection("S")?);
                let sig_y = self.sigmap.map(cell.connection("Y")?);

                non_feedback_nets.extend(sig_s.iter());

                let width = sig_y.width();
                for i in 0..width {
                    let upstream =
                        muxtree_upstream.entry(sig_y.bit(i)).or_default();
                    upstream.push(sig_a.bit(i));
                    for j in 0..sig_s.width() {
                        upstream.push(sig_b.bit(i + j * width));
                    }
                }
                continue;
            }

            let ignore_data_port =
                matches!(cell.ty, CellType::Memrd | CellType::Memwr)
                    && cell.memid()? == memid;
            for (port, sig) in cell.connections() {
                if ignore_data_port && port == "DATA" {
                    continue;
                }
                for bit in sig.iter() {
                    non_feedback_nets.insert(self.sigmap.bit(bit));
                }
            }
        }

        // Propagate backward through the mux forest to a fixed point.
        let mut queue: VecDeque<SigBit> =
            non_feedback_nets.iter().copied().collect();
        while let Some(bit) = queue.pop_front() {
            let Some(upstream) = muxtree_upstream.get(&bit) else {
                continue;
            };
            for &up in upstream {
                if non_feedback_nets.insert(up) {
                    queue.push_back(up);
                }
            }
        }

        // Async read ports whose data is consumed only by mux trees, per
        // address and data bit index.
        let mut async_rd_bits: HashMap<SigSpec, Vec<HashSet<SigBit>>> =
            HashMap::new();
        for &id in rd_ports {
            let cell = self.module.cell(id);
            if cell.param_bool("CLK_ENABLE")? {
                continue;
            }
            let sig_addr = self.sigmap.map(cell.connection("ADDR")?);
            let sig_data = self.sigmap.map(cell.connection("DATA")?);
            if sig_data.iter().any(|b| non_feedback_nets.contains(&b)) {
                continue;
            }
            let per_bit = async_rd_bits.entry(sig_addr).or_default();
            if per_bit.len() < sig_data.width() {
                per_bit.resize(sig_data.width(), HashSet::new());
            }
            for (i, bit) in sig_data.iter().enumerate() {
                per_bit[i].insert(bit);
            }
        }

        if async_rd_bits.is_empty() {
            return Ok(());
        }

        log::info!(
            "Populating enable bits on write ports of memory {} with \
             async read feedback:",
            memid
        );

        for &id in wr_ports {
            let (addr, mut cell_en, cell_data) = {
                let cell = self.module.cell(id);
                (
                    self.sigmap_xmux.map(cell.connection("ADDR")?),
                    cell.connection("EN")?.clone(),
                    cell.connection("DATA")?.clone(),
                )
            };
            let Some(rd_bits) = async_rd_bits.get(&addr) else {
                continue;
            };

            log::info!(
                "  Analyzing write port `{}'.",
                self.module.cell(id).name()
            );

            let mut created_conditions = 0;
            for i in 0..cell_data.width() {
                if cell_en.bit(i) == SigBit::ZERO {
                    continue;
                }

                let mut state = Cube::new();
                let mut conditions = Conditions::new();

                // A write that was disabled must stay disabled.
                let en_bit = self.sigmap.bit(cell_en.bit(i));
                if en_bit.is_wire() {
                    state.insert(en_bit, false);
                    conditions.insert(state.clone());
                }

                if let Some(sinks) = rd_bits.get(i) {
                    let mut visited = HashSet::new();
                    self.find_data_feedback(
                        sinks,
                        self.sigmap.bit(cell_data.bit(i)),
                        &state,
                        &mut conditions,
                        &mut visited,
                    )?;
                }
                let new_en = self
                    .conditions_to_logic(&conditions, &mut created_conditions);
                cell_en.replace_bit(i, new_en);
            }

            if created_conditions > 0 {
                log::info!(
                    "    Added enable logic for {} different cases.",
                    created_conditions
                );
                self.module.cell_mut(id).set_connection("EN", cell_en);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------
    // Consolidate write ports that write to the same address
    // ------------------------------------------------------

    /// Zero out `bits` wherever `mask_bits` is high, but only when the
    /// single-bit `do_mask` is asserted. This version does not preserve
    /// bit grouping.
    fn mask_en_naive(
        &mut self,
        do_mask: SigSpec,
        bits: SigSpec,
        mask_bits: SigSpec,
    ) -> SigSpec {
        let ones = SigSpec::repeat(State::S1, bits.width());
        let inv_mask_bits = self.module.add_not(mask_bits);
        let inv_mask_bits_filtered =
            self.module.add_mux(ones, inv_mask_bits, do_mask);
        self.module.add_and(inv_mask_bits_filtered, bits)
    }

    /// Like [Self::mask_en_naive], but distinct (bit, mask) pairs each
    /// get exactly one gate bit, which is fanned out to every position
    /// sharing the pair. Downstream mapping relies on bit groups staying
    /// groups.
    fn mask_en_grouped(
        &mut self,
        do_mask: SigSpec,
        bits: SigSpec,
        mask_bits: SigSpec,
    ) -> SigSpec {
        let mut groups: HashMap<(SigBit, SigBit), usize> = HashMap::new();
        let mut grouped_bits = SigSpec::new();
        let mut grouped_mask_bits = SigSpec::new();

        for k in 0..bits.width() {
            let key = (bits.bit(k), mask_bits.bit(k));
            groups.entry(key).or_insert_with(|| {
                grouped_bits.push(key.0);
                grouped_mask_bits.push(key.1);
                grouped_bits.width() - 1
            });
        }

        let grouped_result =
            self.mask_en_naive(do_mask, grouped_bits, grouped_mask_bits);

        (0..bits.width())
            .map(|k| {
                grouped_result.bit(groups[&(bits.bit(k), mask_bits.bit(k))])
            })
            .collect()
    }

    /// Combine the enables and data of two ports with overlapping active
    /// bits. The merged enable is the grouped OR; the merged data is
    /// rebuilt from set/unset masks so the later port wins per bit.
    fn merge_en_data(
        &mut self,
        merged_en: &mut SigSpec,
        merged_data: &mut SigSpec,
        next_en: SigSpec,
        next_data: SigSpec,
    ) {
        let mut groups: HashMap<(SigBit, SigBit), usize> = HashMap::new();
        let mut grouped_old_en = SigSpec::new();
        let mut grouped_next_en = SigSpec::new();

        for k in 0..merged_en.width() {
            let key = (merged_en.bit(k), next_en.bit(k));
            groups.entry(key).or_insert_with(|| {
                grouped_old_en.push(key.0);
                grouped_next_en.push(key.1);
                grouped_old_en.width() - 1
            });
        }

        let grouped_new_en =
            self.module.add_or(grouped_old_en, grouped_next_en);
        let new_merged_en: SigSpec = (0..merged_en.width())
            .map(|k| {
                grouped_new_en.bit(groups[&(merged_en.bit(k), next_en.bit(k))])
            })
            .collect();

        let inv_old_data = self.module.add_not(merged_data.clone());
        let old_data_set =
            self.module.add_and(merged_en.clone(), merged_data.clone());
        let old_data_unset =
            self.module.add_and(merged_en.clone(), inv_old_data);
        let inv_next_data = self.module.add_not(next_data.clone());
        let new_data_set = self.module.add_and(next_en.clone(), next_data);
        let new_data_unset = self.module.add_and(next_en, inv_next_data);

        let mut new_merged_data =
            SigSpec::repeat(State::Sx, merged_data.width());
        new_merged_data = self.module.add_or(new_merged_data, old_data_set);
        let inv = self.module.add_not(old_data_unset);
        new_merged_data = self.module.add_and(new_merged_data, inv);
        new_merged_data = self.module.add_or(new_merged_data, new_data_set);
        let inv = self.module.add_not(new_data_unset);
        new_merged_data = self.module.add_and(new_merged_data, inv);

        *merged_en = new_merged_en;
        *merged_data = new_merged_data;
    }

    fn consolidate_wr_by_addr(
        &mut self,
        memid: &str,
        wr_ports: &mut Vec<CellId>,
    ) -> BractResult<()> {
        if wr_ports.len() <= 1 {
            return Ok(());
        }

        log::info!(
            "Consolidating write ports of memory {} by address:",
            memid
        );

        let mut ports: Vec<Option<CellId>> =
            wr_ports.iter().copied().map(Some).collect();
        let mut last_port_by_addr: HashMap<SigSpec, usize> = HashMap::new();
        let mut active_bits_on_port: Vec<Vec<bool>> = Vec::new();

        let mut cache_clk_enable = false;
        let mut cache_clk_polarity = false;
        let mut cache_clk = SigSpec::new();

        for i in 0..ports.len() {
            let id = match ports[i] {
                Some(id) => id,
                None => continue,
            };
            let (clk_enable, clk_polarity, clk, addr, en_bits) = {
                let cell = self.module.cell(id);
                (
                    cell.param_bool("CLK_ENABLE")?,
                    cell.param_bool("CLK_POLARITY")?,
                    self.sigmap.map(cell.connection("CLK")?),
                    self.sigmap_xmux.map(cell.connection("ADDR")?),
                    self.sigmap.map(cell.connection("EN")?),
                )
            };

            if clk_enable != cache_clk_enable
                || (cache_clk_enable
                    && (clk != cache_clk
                        || clk_polarity != cache_clk_polarity))
            {
                cache_clk_enable = clk_enable;
                cache_clk_polarity = clk_polarity;
                cache_clk = clk;
                last_port_by_addr.clear();

                if cache_clk_enable {
                    log::info!(
                        "  New clock domain: {} {}",
                        if cache_clk_polarity {
                            "posedge"
                        } else {
                            "negedge"
                        },
                        self.module.signal_string(&cache_clk)
                    );
                } else {
                    log::info!("  New clock domain: unclocked");
                }
            }

            log::info!(
                "    Port {} (`{}') has addr {}.",
                i,
                self.module.cell(id).name(),
                self.module.signal_string(&addr)
            );

            let active: Vec<bool> = en_bits
                .iter()
                .map(|b| b != SigBit::ZERO)
                .collect();
            active_bits_on_port.push(active);
            log::debug!(
                "      Active bits: {}",
                active_string(&active_bits_on_port[i])
            );

            if let Some(&last_i) = last_port_by_addr.get(&addr) {
                log::info!("      Merging port {} into this one.", last_i);
                let width = en_bits.width();
                let last_active = active_bits_on_port[last_i].clone();

                let mut found_overlapping_bits = false;
                for k in 0..width {
                    if active_bits_on_port[i][k] && last_active[k] {
                        found_overlapping_bits = true;
                    }
                    active_bits_on_port[i][k] |= last_active[k];
                }

                // Force this port's addr input to the canonical address,
                // stripping the don't-care muxes.
                self.module
                    .cell_mut(id)
                    .set_connection("ADDR", addr.clone());

                let last_id = match ports[last_i] {
                    Some(id) => id,
                    None => unreachable!("merged port already deleted"),
                };

                // If any of the ports between `last_i' and `i' write to
                // the same address, they have priority over whatever
                // `last_i' wrote, so `last_i's contribution is masked
                // whenever such a port hits this address.
                let mut merged_en = {
                    let cell = self.module.cell(last_id);
                    self.sigmap.map(cell.connection("EN")?)
                };

                for j in (last_i + 1)..i {
                    let Some(jid) = ports[j] else {
                        continue;
                    };
                    let overlapping = (0..width).any(|k| {
                        active_bits_on_port[i][k]
                            && active_bits_on_port[j][k]
                    });
                    if !overlapping {
                        continue;
                    }
                    log::info!(
                        "      Creating collision-detect logic for port {}.",
                        j
                    );
                    let (j_addr, j_en) = {
                        let cell = self.module.cell(jid);
                        (
                            cell.connection("ADDR")?.clone(),
                            self.sigmap.map(cell.connection("EN")?),
                        )
                    };
                    let is_same_addr =
                        self.module.add_eq(addr.clone(), j_addr);
                    merged_en =
                        self.mask_en_grouped(is_same_addr, merged_en, j_en);
                }

                // Then merge the (masked) EN and the DATA signals.
                let mut merged_data =
                    self.module.cell(last_id).connection("DATA")?.clone();
                let (this_en, this_data) = {
                    let cell = self.module.cell(id);
                    (
                        self.sigmap.map(cell.connection("EN")?),
                        self.sigmap.map(cell.connection("DATA")?),
                    )
                };
                if found_overlapping_bits {
                    log::info!(
                        "      Creating logic for merging DATA and EN ports."
                    );
                    self.merge_en_data(
                        &mut merged_en,
                        &mut merged_data,
                        this_en,
                        this_data,
                    );
                } else {
                    for k in 0..width {
                        if !last_active[k] {
                            merged_en.replace_bit(k, this_en.bit(k));
                            merged_data.replace_bit(k, this_data.bit(k));
                        }
                    }
                }

                // Connect the new EN and DATA signals and remove the old
                // write port.
                let cell = self.module.cell_mut(id);
                cell.set_connection("EN", merged_en);
                cell.set_connection("DATA", merged_data);
                self.module.remove_cell(last_id);
                ports[last_i] = None;

                log::debug!(
                    "      Active bits: {}",
                    active_string(&active_bits_on_port[i])
                );
            }

            last_port_by_addr.insert(addr, i);
        }

        *wr_ports = ports.into_iter().flatten().collect();
        Ok(())
    }

    // --------------------------------------------------------
    // Consolidate write ports using sat-based resource sharing
    // --------------------------------------------------------

    fn consolidate_wr_using_sat(
        &mut self,
        memid: &str,
        wr_ports: &mut Vec<CellId>,
        modwalker: &ModWalker,
    ) -> BractResult<()> {
        if wr_ports.len() <= 1 {
            return Ok(());
        }

        let mut satgen = SatGen::new(&modwalker.sigmap);

        // Find the list of considered ports and port pairs. A port with a
        // constant-high enable bit never profits from sharing; a port
        // with no driven enable bit cannot be reasoned about.
        let mut considered_ports: HashSet<usize> = HashSet::new();
        for (i, &id) in wr_ports.iter().enumerate() {
            let bits = modwalker
                .sigmap
                .map(self.module.cell(id).connection("EN")?);
            if bits.iter().any(|b| b == SigBit::ONE) {
                continue;
            }
            if modwalker.has_drivers(&bits) {
                considered_ports.insert(i);
            }
        }

        log::info!(
            "Consolidating write ports of memory {} using sat-based \
             resource sharing:",
            memid
        );

        let mut considered_port_pairs: HashSet<usize> = HashSet::new();
        let mut cache_clk_enable = false;
        let mut cache_clk_polarity = false;
        let mut cache_clk = SigSpec::new();

        for (i, &id) in wr_ports.iter().enumerate() {
            let cell = self.module.cell(id);
            let clk_enable = cell.param_bool("CLK_ENABLE")?;
            let clk_polarity = cell.param_bool("CLK_POLARITY")?;
            let clk = self.sigmap.map(cell.connection("CLK")?);

            if clk_enable != cache_clk_enable
                || (cache_clk_enable
                    && (clk != cache_clk
                        || clk_polarity != cache_clk_polarity))
            {
                cache_clk_enable = clk_enable;
                cache_clk_polarity = clk_polarity;
                cache_clk = clk;
            } else if i > 0
                && considered_ports.contains(&(i - 1))
                && considered_ports.contains(&i)
            {
                considered_port_pairs.insert(i);
            }

            if cache_clk_enable {
                log::info!(
                    "  Port {} (`{}') on {} {}: {}",
                    i,
                    cell.name(),
                    if cache_clk_polarity {
                        "posedge"
                    } else {
                        "negedge"
                    },
                    self.module.signal_string(&cache_clk),
                    if considered_ports.contains(&i) {
                        "considered"
                    } else {
                        "not considered"
                    }
                );
            } else {
                log::info!(
                    "  Port {} (`{}') unclocked: {}",
                    i,
                    cell.name(),
                    if considered_ports.contains(&i) {
                        "considered"
                    } else {
                        "not considered"
                    }
                );
            }
        }

        if considered_port_pairs.is_empty() {
            log::info!(
                "  No two subsequent ports in same clock domain considered \
                 -> nothing to consolidate."
            );
            return Ok(());
        }

        // Create the SAT representation of the common input cone of all
        // considered EN signals.
        let mut port_to_sat_variable: HashMap<usize, bract_sat::Lit> =
            HashMap::new();
        let mut bits_queue: HashSet<SigBit> = HashSet::new();

        for (i, &id) in wr_ports.iter().enumerate() {
            if !(considered_port_pairs.contains(&i)
                || considered_port_pairs.contains(&(i + 1)))
            {
                continue;
            }
            let sig = modwalker
                .sigmap
                .map(self.module.cell(id).connection("EN")?);
            let lits = satgen.import_sig(&sig);
            let active = satgen.solver_mut().or_gate(&lits);
            port_to_sat_variable.insert(i, active);
            bits_queue.extend(sig.iter());
        }

        let mut sat_cells: BTreeSet<CellId> = BTreeSet::new();
        while !bits_queue.is_empty() {
            let portbits = modwalker.get_drivers(bits_queue.drain());
            for pbit in portbits {
                if !sat_cells.contains(&pbit.cell)
                    && self.module.cell(pbit.cell).ty.sat_importable()
                {
                    bits_queue.extend(modwalker.cell_inputs(pbit.cell));
                    sat_cells.insert(pbit.cell);
                }
            }
        }

        log::info!(
            "  Common input cone for all EN signals: {} cells.",
            sat_cells.len()
        );

        for &cell_id in &sat_cells {
            satgen.import_cell(self.module.cell(cell_id))?;
        }

        log::info!(
            "  Size of unconstrained SAT problem: {} variables, {} clauses",
            satgen.solver().num_vars(),
            satgen.solver().num_clauses()
        );

        // Merge subsequent ports if the solver proves their enables
        // mutually exclusive.
        let mut ports: Vec<Option<CellId>> =
            wr_ports.iter().copied().map(Some).collect();

        for i in 0..ports.len() {
            if !considered_port_pairs.contains(&i) {
                continue;
            }
            let last_active = port_to_sat_variable[&(i - 1)];
            let this_active = port_to_sat_variable[&i];

            if satgen.solver_mut().solve(&[last_active, this_active]) {
                log::info!(
                    "  According to SAT solver sharing of port {} with \
                     port {} is not possible.",
                    i - 1,
                    i
                );
                continue;
            }

            log::info!("  Merging port {} into port {}.", i - 1, i);
            let merged_active =
                satgen.solver_mut().or_gate(&[last_active, this_active]);
            port_to_sat_variable.insert(i, merged_active);

            let last_id = match ports[i - 1] {
                Some(id) => id,
                None => unreachable!("considered pair references a deleted port"),
            };
            let id = match ports[i] {
                Some(id) => id,
                None => unreachable!("considered pair references a deleted port"),
            };

            let (last_addr, last_data, last_en) = {
                let cell = self.module.cell(last_id);
                (
                    cell.connection("ADDR")?.clone(),
                    cell.connection("DATA")?.clone(),
                    modwalker.sigmap.map(cell.connection("EN")?),
                )
            };
            let (this_addr, this_data, this_en) = {
                let cell = self.module.cell(id);
                (
                    cell.connection("ADDR")?.clone(),
                    cell.connection("DATA")?.clone(),
                    modwalker.sigmap.map(cell.connection("EN")?),
                )
            };

            let this_en_active = self.module.add_reduce_or(this_en.clone());

            let new_addr = self.module.add_mux(
                last_addr,
                this_addr,
                this_en_active.clone(),
            );
            let new_data = self.module.add_mux(
                last_data,
                this_data,
                this_en_active.clone(),
            );

            // Grouped mux for the enable bits: one mux bit per distinct
            // (last, this) pair, fanned out over the positions sharing
            // the pair.
            let mut groups_en: HashMap<(SigBit, SigBit), usize> =
                HashMap::new();
            let mut grouped_last_en = SigSpec::new();
            let mut grouped_this_en = SigSpec::new();
            for j in 0..this_en.width() {
                let key = (last_en.bit(j), this_en.bit(j));
                groups_en.entry(key).or_insert_with(|| {
                    grouped_last_en.push(key.0);
                    grouped_this_en.push(key.1);
                    grouped_last_en.width() - 1
                });
            }
            let grouped_en = self.module.fresh_wire(grouped_last_en.width());
            self.module.add_mux_into(
                grouped_last_en,
                grouped_this_en,
                this_en_active,
                grouped_en.clone(),
            );
            let new_en: SigSpec = (0..this_en.width())
                .map(|j| {
                    grouped_en
                        .bit(groups_en[&(last_en.bit(j), this_en.bit(j))])
                })
                .collect();

            let cell = self.module.cell_mut(id);
            cell.set_connection("ADDR", new_addr);
            cell.set_connection("DATA", new_data);
            cell.set_connection("EN", new_en);

            self.module.remove_cell(last_id);
            ports[i - 1] = None;
        }

        *wr_ports = ports.into_iter().flatten().collect();
        Ok(())
    }
}

fn active_string(bits: &[bool]) -> String {
    bits.iter()
        .rev()
        .map(|&b| if b { '1' } else { '0' })
        .collect()
}
