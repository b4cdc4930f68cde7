//! A basic demonstration of grouping a small peak list both ways, with
//! [`mzempcpd::EmpiricalCompoundConstructor`] and [`mzempcpd::TreeAssembler`]

use mzempcpd::{
    tree::TreeParams, EmpiricalCompoundConstructor, GroupingError, IonMode, Peak, PeakList,
    TreeAssembler,
};

fn main() -> Result<(), GroupingError> {
    // The peaks would come from an upstream feature detection step. Apex times are in seconds.
    let peaks = PeakList::new(vec![
        Peak::new("F1", 180.0634, 312.0, 2.1e6).with_bases(305.0, 320.0),
        Peak::new("F2", 181.0668, 312.2, 1.4e5).with_bases(306.0, 319.0),
        Peak::new("F3", 202.0454, 312.5, 6.0e5).with_bases(305.5, 321.0),
        Peak::new("F4", 203.0488, 312.5, 4.1e4).with_bases(306.0, 320.0),
        Peak::new("F5", 198.0972, 311.8, 3.3e5).with_bases(305.0, 319.5),
        Peak::new("F6", 244.1210, 540.0, 8.0e4),
    ])?;

    // Seed with isotopes and the common adducts, then extend with the rest.
    let constructor = EmpiricalCompoundConstructor::new(IonMode::Positive);
    let (result, summary) = constructor.peaks_to_epds(&peaks);
    println!("{summary}");
    for compound in result.compounds.iter() {
        println!("Compound {}: {:?}", compound.id, compound.list_peaks(&peaks));
    }

    // The tree model relates isotopologues first and grafts adducts beneath them.
    let assembler = TreeAssembler::new(TreeParams {
        include_singletons: true,
        ..Default::default()
    });
    let trees = assembler.assemble(&peaks);
    for (_, tree) in trees.assembly.forest.iter() {
        println!("{}", tree.render());
    }
    Ok(())
}
