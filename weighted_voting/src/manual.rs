/*!

This is the long-form manual for `weighted_voting` and `wvtally`.

## The voting model

An **event** is a meeting during which an assembly votes on a list of
**questions** (resolutions). Every question is answered with the same set of
**choices**, defined once per event.

The voters are **members**, partitioned into **groups**. Each group carries
an integer **weight**; the weights of the groups of an event must sum to 100
before the event can be started. Aggregation always happens in two stages:
votes are tallied per group, then the group tallies are merged according to
the electoral rule of the event:

* `Majority` — within each group, the choice with the most votes collects
  the whole weight of the group. The merged totals are accumulated weights
  and sum to the total weight of the groups.
* `Proportional` — the weight of each group is split across the choices in
  proportion to their share of the group's votes. The merged totals are
  renormalized to percentages (2 decimal places).

A member who cannot attend may hand a **procuration** to another member of
the same group. A member delegates at most once, and cannot delegate to
someone who has himself delegated away. When the event starts, every member
is given a vote allowance for every question: 0 if he delegated away,
otherwise 1 plus the number of procurations he holds. Casting a ballot
spends one allowance per submitted choice, so a proxy holder can spread the
votes he carries over several choices or spend them on the same one.

## Input format of `wvtally`

The program reads a single JSON file:

```text
{
  "outputSettings": { "eventName": "...", "company": "...", "eventDate": "..." },
  "event": {
    "slug": "...",
    "rule": "MAJ",
    "quorum": 33,
    "groups": [
      { "name": "...", "weight": 30,
        "members": [ { "username": "...", "lastName": "..." } ] }
    ],
    "questions": [ { "number": 1, "text": "..." } ],
    "choices": [ { "number": 1, "text": "..." } ]
  },
  "procurations": [ { "from": "...", "to": "...", "confirmed": true } ],
  "ballots": [ { "member": "...", "question": 1, "choices": [1] } ]
}
```

`rule` is `"MAJ"` (majority) or `"PROP"` (proportional). Ballots are applied
in file order after all procurations have been recorded and the event has
been started; a ballot that overspends a member's allowance aborts the
tabulation.

The summary is written in JSON to the location given with `--out` (or to
the standard output). With `--reference`, the produced summary is compared
against an expected summary file and any difference is reported as an
error.

 */
